//! Build manifest model, as declared by a source package's `package.xml`.

use std::cmp::Ordering;

use crate::stability::Stability;
use crate::version::Version;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub summary: String,
    pub description: String,
    pub version: String,
    pub api_version: String,
    pub stability: Stability,
    pub api_stability: Stability,
    pub license: String,
    pub php: RuntimeRequirement,
    pub required_extensions: Vec<ExtensionDependency>,
    pub optional_extensions: Vec<ExtensionDependency>,
    pub configure_options: Vec<ConfigureOption>,
    pub changelog: Vec<ChangelogEntry>,
}

/// Host runtime version bounds; every bound is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeRequirement {
    pub min: Option<String>,
    pub max: Option<String>,
    pub exclude: Vec<String>,
}

impl RuntimeRequirement {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.exclude.is_empty()
    }

    /// `min` is inclusive, `max` is inclusive, each `exclude` must differ.
    pub fn matches(&self, version: &str) -> bool {
        let current = Version::parse(version);
        let cmp = |bound: &str| current.precedence_cmp(&Version::parse(bound));

        if let Some(min) = &self.min
            && cmp(min) == Ordering::Less
        {
            return false;
        }
        if let Some(max) = &self.max
            && cmp(max) == Ordering::Greater
        {
            return false;
        }
        self.exclude.iter().all(|ex| cmp(ex) != Ordering::Equal)
    }

    /// Human readable form, e.g. `>= 7.0.0, <= 8.99.99, != 7.1.0`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(min) = &self.min {
            parts.push(format!(">= {}", min));
        }
        if let Some(max) = &self.max {
            parts.push(format!("<= {}", max));
        }
        for ex in &self.exclude {
            parts.push(format!("!= {}", ex));
        }
        if parts.is_empty() {
            "any version".to_string()
        } else {
            parts.join(", ")
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionDependency {
    pub name: String,
    pub min: Option<String>,
    pub max: Option<String>,
    pub exclude: Vec<String>,
}

/// A `./configure` option the package expects an answer for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigureOption {
    pub name: String,
    pub default: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangelogEntry {
    pub version: String,
    pub stability: Stability,
    pub date: String,
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirement(min: Option<&str>, max: Option<&str>, exclude: &[&str]) -> RuntimeRequirement {
        RuntimeRequirement {
            min: min.map(str::to_string),
            max: max.map(str::to_string),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn empty_requirement_accepts_everything() {
        let req = RuntimeRequirement::default();
        assert!(req.is_empty());
        assert!(req.matches("5.6.40"));
        assert_eq!(req.describe(), "any version");
    }

    #[test]
    fn bounds_are_inclusive() {
        let req = requirement(Some("7.0.0"), Some("8.99.99"), &[]);
        assert!(req.matches("7.0.0"));
        assert!(req.matches("8.99.99"));
        assert!(req.matches("8.2.10"));
        assert!(!req.matches("5.6.40"));
        assert!(!req.matches("9.0.0"));
    }

    #[test]
    fn exclusions_reject_exact_versions() {
        let req = requirement(Some("7.0.0"), None, &["7.1.0", "7.1.1"]);
        assert!(!req.matches("7.1.0"));
        assert!(!req.matches("7.1.1"));
        assert!(req.matches("7.1.2"));
        assert_eq!(req.describe(), ">= 7.0.0, != 7.1.0, != 7.1.1");
    }
}
