//! Version selection.
//!
//! Given every published release of a package, pick the highest version that
//! is both stable enough and accepted by the constraint.
//!
//! # Algorithm
//!
//! 1. Sort the release set in descending precedence order
//! 2. Skip releases whose stability is strictly below the minimum
//! 3. Return the first remaining release the constraint accepts
//!
//! The release set is a hash map, so the explicit sort is what makes the
//! result deterministic.

use crate::constraint::Constraint;
use crate::release::ReleaseSet;
use crate::stability::Stability;
use crate::version::Version;

/// Select the best release, or `None` when nothing qualifies.
pub fn select_version(
    releases: &ReleaseSet,
    constraint: &Constraint,
    minimum_stability: Stability,
) -> Option<String> {
    releases.sorted_versions().into_iter().find(|version| {
        let stable_enough = releases
            .stability(version)
            .is_some_and(|stability| stability >= minimum_stability);
        stable_enough && constraint.matches(&Version::parse(version))
    })
}
