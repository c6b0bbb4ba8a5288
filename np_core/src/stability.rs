//! Release stability tiers.
//!
//! Tiers are totally ordered by maturity, so filtering a release set against a
//! minimum tier is a plain `<` comparison.

use std::fmt;
use std::str::FromStr;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stability {
    #[default]
    Unknown,
    Snapshot,
    Devel,
    Alpha,
    Beta,
    Stable,
}

impl Stability {
    /// Lenient conversion used for registry and manifest data: anything
    /// unrecognised becomes `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "snapshot" => Stability::Snapshot,
            "devel" => Stability::Devel,
            "alpha" => Stability::Alpha,
            "beta" => Stability::Beta,
            "stable" => Stability::Stable,
            _ => Stability::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stability::Unknown => "unknown",
            Stability::Snapshot => "snapshot",
            Stability::Devel => "devel",
            Stability::Alpha => "alpha",
            Stability::Beta => "beta",
            Stability::Stable => "stable",
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parsing, used for user input such as `--minimum-stability`.
impl FromStr for Stability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Stability::from_label(&s.to_ascii_lowercase()) {
            Stability::Unknown => Err(Error::InvalidStability {
                value: s.to_string(),
            }),
            known => Ok(known),
        }
    }
}
