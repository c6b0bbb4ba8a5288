//! Console formatting helpers.

use std::fmt::Display;
use std::time::Duration;

use console::{StyledObject, style};

use np_core::Stability;
use np_io::PackageSpec;

/// Print a `==> message` step header.
pub fn step(message: impl Display) {
    println!("{} {}", style("==>").cyan().bold(), message);
}

/// Print an indented result line with a check mark.
pub fn done(message: impl Display) {
    println!("    {} {}", style("✓").green(), message);
}

pub fn stability_label(stability: Stability) -> StyledObject<&'static str> {
    let label = stability.as_str();
    match stability {
        Stability::Stable => style(label).green(),
        Stability::Beta | Stability::Alpha => style(label).yellow(),
        Stability::Devel | Stability::Snapshot | Stability::Unknown => style(label).red(),
    }
}

/// Comma separated package list as typed by the user.
pub fn format_specs(specs: &[PackageSpec]) -> String {
    specs
        .iter()
        .map(PackageSpec::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{}m {:02}s", elapsed.as_secs() / 60, elapsed.as_secs() % 60)
    }
}
