//! Version constraints.
//!
//! A constraint is a disjunction of conjunctions of comparison terms:
//!
//! ```text
//! ~5.1.0           >=5.1.0, <5.2.0dev
//! ^1.2 || ^2.0     (>=1.2, <2.0dev) or (>=2.0, <3.0dev)
//! >=1.0 <2.0       both must hold
//! 1.2.*            >=1.2.0dev, <1.3.0dev
//! 1.0 - 2.0        >=1.0, <=2.0
//! ```
//!
//! The upper bounds of tilde, caret and wildcard ranges carry a `dev`
//! suffix so that pre-releases of the next version are excluded.

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::Error;
use crate::version::Version;

const TERM_PATTERN: &str =
    r"^(>=|<=|<>|!=|==|=|>|<|~|\^)?\s*[vV]?([0-9][0-9A-Za-z.\-_+]*?)(\.\*)?$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    op: Op,
    version: Version,
}

impl Term {
    fn new(op: Op, version: impl AsRef<str>) -> Self {
        Term {
            op,
            version: Version::parse(version.as_ref()),
        }
    }

    fn matches(&self, candidate: &Version) -> bool {
        let ord = candidate.precedence_cmp(&self.version);
        match self.op {
            Op::Eq => ord.is_eq(),
            Op::Ne => ord.is_ne(),
            Op::Gt => ord.is_gt(),
            Op::Ge => ord.is_ge(),
            Op::Lt => ord.is_lt(),
            Op::Le => ord.is_le(),
        }
    }
}

/// A parsed version constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    raw: String,
    /// OR of AND-groups; an empty group matches everything.
    alternatives: Vec<Vec<Term>>,
}

impl Constraint {
    /// The constraint that accepts every version.
    pub fn any() -> Self {
        Constraint {
            raw: "*".to_string(),
            alternatives: vec![Vec::new()],
        }
    }

    pub fn parse(raw: &str) -> Result<Self, Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Constraint {
                raw: raw.to_string(),
                ..Constraint::any()
            });
        }

        let term_re = Regex::new(TERM_PATTERN).map_err(|e| invalid(raw, e.to_string()))?;

        let mut alternatives = Vec::new();
        for group in trimmed.replace("||", "|").split('|') {
            let group = group.trim();
            if group.is_empty() {
                return Err(invalid(raw, "empty alternative"));
            }
            alternatives.push(parse_group(raw, group, &term_re)?);
        }

        Ok(Constraint {
            raw: raw.to_string(),
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_any(&self) -> bool {
        self.alternatives.iter().any(|group| group.is_empty())
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives
            .iter()
            .any(|group| group.iter().all(|term| term.matches(version)))
    }

    pub fn matches_str(&self, version: &str) -> bool {
        self.matches(&Version::parse(version))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Constraint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Constraint::parse(s)
    }
}

fn invalid(raw: &str, reason: impl Into<String>) -> Error {
    Error::InvalidConstraint {
        constraint: raw.to_string(),
        reason: reason.into(),
    }
}

fn parse_group(raw: &str, group: &str, term_re: &Regex) -> Result<Vec<Term>, Error> {
    // Hyphen ranges need surrounding whitespace to be told apart from
    // pre-release separators such as `1.0.0-beta`.
    if let Some((low, high)) = group.split_once(" - ") {
        let (low, high) = (low.trim(), high.trim());
        if low.is_empty() || high.is_empty() || low.contains(' ') || high.contains(' ') {
            return Err(invalid(raw, "hyphen range needs exactly two versions"));
        }
        let lower = parse_term(raw, low, term_re)?;
        let upper = parse_term(raw, high, term_re)?;
        return match (lower.as_slice(), upper.as_slice()) {
            ([Term { op: Op::Eq, version: lo }], [Term { op: Op::Eq, version: hi }]) => Ok(vec![
                Term::new(Op::Ge, lo.as_str()),
                Term::new(Op::Le, hi.as_str()),
            ]),
            _ => Err(invalid(raw, "hyphen range bounds must be plain versions")),
        };
    }

    let mut terms = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in group.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        // Allow `>= 1.2` with whitespace between operator and version.
        if token.chars().all(|c| "<>=!~^".contains(c)) {
            if pending_op.is_some() {
                return Err(invalid(raw, format!("unexpected operator '{}'", token)));
            }
            pending_op = Some(token);
            continue;
        }
        let term = match pending_op.take() {
            Some(op) => format!("{}{}", op, token),
            None => token.to_string(),
        };
        terms.extend(parse_term(raw, &term, term_re)?);
    }

    if let Some(op) = pending_op {
        return Err(invalid(raw, format!("operator '{}' has no version", op)));
    }

    Ok(terms)
}

fn parse_term(raw: &str, term: &str, term_re: &Regex) -> Result<Vec<Term>, Error> {
    if term == "*" {
        return Ok(Vec::new());
    }

    let caps = term_re
        .captures(term)
        .ok_or_else(|| invalid(raw, format!("unrecognised term '{}'", term)))?;
    let op = caps.get(1).map(|m| m.as_str());
    let version = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let wildcard = caps.get(3).is_some();

    if wildcard {
        if op.is_some() {
            return Err(invalid(
                raw,
                format!("wildcard '{}' cannot be combined with an operator", term),
            ));
        }
        return wildcard_range(raw, version);
    }

    let terms = match op {
        None | Some("=") | Some("==") => vec![Term::new(Op::Eq, version)],
        Some("!=") | Some("<>") => vec![Term::new(Op::Ne, version)],
        Some(">") => vec![Term::new(Op::Gt, version)],
        Some(">=") => vec![Term::new(Op::Ge, version)],
        Some("<") => vec![Term::new(Op::Lt, version)],
        Some("<=") => vec![Term::new(Op::Le, version)],
        Some("~") => tilde_range(raw, version)?,
        Some("^") => caret_range(raw, version)?,
        Some(other) => return Err(invalid(raw, format!("unknown operator '{}'", other))),
    };

    Ok(terms)
}

fn release_numbers(raw: &str, version: &str) -> Result<Vec<u64>, Error> {
    let numbers = Version::parse(version).release_numbers();
    if numbers.is_empty() {
        return Err(invalid(raw, format!("'{}' has no numeric part", version)));
    }
    Ok(numbers)
}

/// Render `numbers`, padded with zeros to `width` components, as a `dev` bound.
fn dev_bound(mut numbers: Vec<u64>, width: usize) -> String {
    numbers.resize(numbers.len().max(width), 0);
    let joined = numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(".");
    format!("{}dev", joined)
}

fn tilde_range(raw: &str, version: &str) -> Result<Vec<Term>, Error> {
    let numbers = release_numbers(raw, version)?;
    let width = numbers.len().max(2);
    let keep = numbers.len().saturating_sub(1).max(1);

    let mut upper = numbers[..keep].to_vec();
    if let Some(last) = upper.last_mut() {
        *last += 1;
    }

    Ok(vec![
        Term::new(Op::Ge, version),
        Term::new(Op::Lt, dev_bound(upper, width)),
    ])
}

fn caret_range(raw: &str, version: &str) -> Result<Vec<Term>, Error> {
    let numbers = release_numbers(raw, version)?;
    let width = numbers.len();
    let bump = numbers
        .iter()
        .position(|n| *n != 0)
        .unwrap_or(numbers.len() - 1);

    let mut upper = numbers[..=bump].to_vec();
    upper[bump] += 1;

    Ok(vec![
        Term::new(Op::Ge, version),
        Term::new(Op::Lt, dev_bound(upper, width)),
    ])
}

fn wildcard_range(raw: &str, prefix: &str) -> Result<Vec<Term>, Error> {
    let numbers = release_numbers(raw, prefix)?;
    let width = numbers.len() + 1;

    let mut upper = numbers.clone();
    if let Some(last) = upper.last_mut() {
        *last += 1;
    }

    Ok(vec![
        Term::new(Op::Ge, dev_bound(numbers, width)),
        Term::new(Op::Lt, dev_bound(upper, width)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(constraint: &str, version: &str) -> bool {
        Constraint::parse(constraint).unwrap().matches_str(version)
    }

    #[test]
    fn star_and_empty_match_everything() {
        for c in ["*", "", "  "] {
            let parsed = Constraint::parse(c).unwrap();
            assert!(parsed.is_any());
            assert!(parsed.matches_str("0.0.1"));
            assert!(parsed.matches_str("7.0.0RC1"));
        }
    }

    #[test]
    fn exact_versions() {
        assert!(accepts("5.1.1", "5.1.1"));
        assert!(accepts("=5.1.1", "5.1.1"));
        assert!(accepts("==5.1", "5.1.0"));
        assert!(!accepts("5.1.1", "5.1.2"));
        assert!(accepts("v5.1.1", "5.1.1"));
    }

    #[test]
    fn exact_match_treats_short_words_as_aliases() {
        assert!(accepts("==1.0a1", "1.0alpha1"));
        assert!(accepts("=2.0beta3", "2.0b3"));
        assert!(!accepts("!=1.0b1", "1.0beta1"));
    }

    #[test]
    fn comparison_operators() {
        assert!(accepts(">=1.2.3", "1.2.3"));
        assert!(accepts(">=1.2.3", "2.0.0"));
        assert!(!accepts(">1.2.3", "1.2.3"));
        assert!(accepts("<2.0", "1.9.9"));
        assert!(!accepts("<2.0", "2.0.0"));
        assert!(accepts("<=2.0", "2.0.0"));
        assert!(accepts("!=1.0", "1.1"));
        assert!(!accepts("<>1.0", "1.0.0"));
        assert!(accepts(">= 1.2", "1.3"));
    }

    #[test]
    fn tilde_ranges() {
        assert!(accepts("~5.1.0", "5.1.0"));
        assert!(accepts("~5.1.0", "5.1.9"));
        assert!(!accepts("~5.1.0", "5.2.0"));
        assert!(!accepts("~5.1.0", "5.2.0RC1"));
        assert!(!accepts("~5.1.0", "5.0.9"));

        assert!(accepts("~1.2", "1.9.0"));
        assert!(!accepts("~1.2", "2.0.0"));
        assert!(!accepts("~1.2", "1.1"));
    }

    #[test]
    fn caret_ranges() {
        assert!(accepts("^1.2.3", "1.2.3"));
        assert!(accepts("^1.2.3", "1.99.0"));
        assert!(!accepts("^1.2.3", "2.0.0"));
        assert!(!accepts("^1.2.3", "2.0.0beta1"));

        assert!(accepts("^0.3.1", "0.3.5"));
        assert!(!accepts("^0.3.1", "0.4.0"));
    }

    #[test]
    fn wildcard_ranges() {
        assert!(accepts("1.2.*", "1.2.0"));
        assert!(accepts("1.2.*", "1.2.0beta1"));
        assert!(accepts("1.2.*", "1.2.17"));
        assert!(!accepts("1.2.*", "1.3.0"));
        assert!(!accepts("1.2.*", "1.1.9"));
    }

    #[test]
    fn hyphen_ranges() {
        assert!(accepts("1.0 - 2.0", "1.0"));
        assert!(accepts("1.0 - 2.0", "1.5.2"));
        assert!(accepts("1.0 - 2.0", "2.0.0"));
        assert!(!accepts("1.0 - 2.0", "2.0.1"));
        // Pre-release dashes are not ranges
        assert!(accepts("1.0.0-beta", "1.0.0beta"));
    }

    #[test]
    fn conjunctions_and_disjunctions() {
        assert!(accepts(">=1.0, <2.0", "1.5"));
        assert!(accepts(">=1.0 <2.0", "1.5"));
        assert!(!accepts(">=1.0 <2.0", "2.5"));
        assert!(accepts("^1.0 || ^3.0", "3.1"));
        assert!(accepts("^1.0 | ^3.0", "1.1"));
        assert!(!accepts("^1.0 || ^3.0", "2.1"));
    }

    #[test]
    fn rejects_malformed_constraints() {
        for bad in ["latest", ">=", ">= >= 1.0", "1.0 ||", ">=1.*", "~abc", "1.0 - "] {
            let err = Constraint::parse(bad).unwrap_err();
            match err {
                Error::InvalidConstraint { constraint, .. } => assert_eq!(constraint, bad),
                other => panic!("unexpected error for {bad:?}: {other:?}"),
            }
        }
    }

    #[test]
    fn display_keeps_original_text() {
        let c: Constraint = "~5.1.0".parse().unwrap();
        assert_eq!(c.to_string(), "~5.1.0");
        assert_eq!(c.as_str(), "~5.1.0");
    }
}
