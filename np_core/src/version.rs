//! Version comparison for PECL releases
//!
//! PECL versions are PHP-style rather than strict semver:
//! - Basic: `5.1.1`
//! - Attached pre-release words: `5.1.0RC1`, `2.0.0beta2`
//! - Separated pre-release words: `1.0.0-alpha`, `3.1.0_dev`
//!
//! Comparison rules (mirroring PHP's `version_compare` canonical form):
//! - `.`, `-`, `_` and `+` separate components, and so does every switch
//!   between digits and letters (`5.1.0RC1` is `5 . 1 . 0 . rc . 1`)
//! - Numeric components compare numerically: `1.10.0 > 1.9.0`
//! - Words rank `dev < alpha = a < beta = b < rc < (number) < pl = p`;
//!   unrecognised words rank below `dev`
//! - A missing component counts as `0` against a number and as a final
//!   release against a word: `1.0 == 1.0.0` and `1.0RC1 < 1.0 < 1.0pl1`

use std::cmp::Ordering;
use std::fmt;

/// A parsed release version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    components: Vec<VersionComponent>,
    original: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum VersionComponent {
    Numeric(u64),
    Word(String),
}

/// Rank a plain number (or a missing component facing a word) sits at.
const RELEASE_RANK: i8 = 4;

fn word_rank(word: &str) -> i8 {
    match word {
        "dev" => 0,
        "alpha" | "a" => 1,
        "beta" | "b" => 2,
        "rc" => 3,
        "pl" | "p" => 5,
        _ => -1,
    }
}

impl VersionComponent {
    fn rank(&self) -> i8 {
        match self {
            VersionComponent::Numeric(_) => RELEASE_RANK,
            VersionComponent::Word(w) => word_rank(w),
        }
    }

    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (VersionComponent::Numeric(a), VersionComponent::Numeric(b)) => a.cmp(b),
            // Known words compare by rank only, so `a == alpha`
            (VersionComponent::Word(a), VersionComponent::Word(b)) => {
                match (word_rank(a), word_rank(b)) {
                    (-1, -1) => a.cmp(b),
                    (ra, rb) => ra.cmp(&rb),
                }
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }

    /// Compare against a component the other version does not have.
    fn cmp_missing(&self) -> Ordering {
        match self {
            VersionComponent::Numeric(n) => n.cmp(&0),
            VersionComponent::Word(w) => word_rank(w).cmp(&RELEASE_RANK),
        }
    }
}

impl Version {
    /// Parse a version string. Parsing never fails: characters that cannot
    /// belong to a component are ignored, a leading `v` is dropped.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        let original = s.to_string();
        let body = s
            .strip_prefix('v')
            .or_else(|| s.strip_prefix('V'))
            .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
            .unwrap_or(s);

        Version {
            components: parse_components(body),
            original,
        }
    }

    /// Get the original version string
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Leading numeric components (`5.1.0RC1` gives `[5, 1, 0]`).
    pub fn release_numbers(&self) -> Vec<u64> {
        self.components
            .iter()
            .map_while(|c| match c {
                VersionComponent::Numeric(n) => Some(*n),
                VersionComponent::Word(_) => None,
            })
            .collect()
    }

    /// Compare by precedence only; `1.0` and `1.0.0` are equal here.
    pub fn precedence_cmp(&self, other: &Version) -> Ordering {
        let max_len = self.components.len().max(other.components.len());

        for i in 0..max_len {
            let cmp = match (self.components.get(i), other.components.get(i)) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(a), None) => a.cmp_missing(),
                (None, Some(b)) => b.cmp_missing().reverse(),
                (None, None) => break,
            };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }

        Ordering::Equal
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order: precedence first, then the original spelling so that sorting
/// is deterministic even for equivalent versions.
impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.precedence_cmp(other)
            .then_with(|| self.original.cmp(&other.original))
    }
}

/// Parse version string into components
fn parse_components(s: &str) -> Vec<VersionComponent> {
    let mut components = Vec::new();
    let mut current = String::new();
    let mut in_numeric = false;

    for c in s.chars() {
        if c == '.' || c == '-' || c == '_' || c == '+' {
            if !current.is_empty() {
                components.push(parse_component(&current));
                current.clear();
            }
            in_numeric = false;
        } else if c.is_ascii_digit() {
            if !in_numeric && !current.is_empty() {
                // Switching from word to number
                components.push(parse_component(&current));
                current.clear();
            }
            in_numeric = true;
            current.push(c);
        } else if c.is_alphanumeric() {
            if in_numeric && !current.is_empty() {
                // Switching from number to word
                components.push(parse_component(&current));
                current.clear();
            }
            in_numeric = false;
            current.push(c);
        }
    }

    if !current.is_empty() {
        components.push(parse_component(&current));
    }

    components
}

fn parse_component(s: &str) -> VersionComponent {
    if let Ok(n) = s.parse::<u64>() {
        VersionComponent::Numeric(n)
    } else {
        VersionComponent::Word(s.to_lowercase())
    }
}

/// Sort version strings in descending precedence order.
pub fn sort_descending<I, S>(versions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed: Vec<Version> = versions
        .into_iter()
        .map(|v| Version::parse(v.as_ref()))
        .collect();
    parsed.sort_by(|a, b| b.cmp(a));
    parsed.into_iter().map(|v| v.original).collect()
}
