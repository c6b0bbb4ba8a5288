//! Info command implementation.

use console::style;

use np_io::{PeclClient, ReleaseClient};

use crate::display::stability_label;

pub async fn run(client: &PeclClient, name: &str) -> Result<(), np_core::Error> {
    let (info, releases) = tokio::try_join!(client.describe_package(name), client.list_releases(name))?;

    println!(
        "{} {}",
        style(&info.name).green().bold(),
        style(format!("[{}]", info.category)).dim()
    );
    if !info.summary.is_empty() {
        println!("{}", info.summary);
    }
    if !info.license.is_empty() {
        println!("License: {}", info.license);
    }
    if let Some(successor) = &info.deprecated_by {
        println!(
            "{} deprecated in favor of {}",
            style("Note:").yellow().bold(),
            successor
        );
    }

    println!();
    println!("{}", style("Releases:").bold());
    if releases.is_empty() {
        println!("  {}", style("(none)").dim());
    }
    for version in releases.sorted_versions() {
        let stability = releases.stability(&version).unwrap_or_default();
        println!("  {:<16} {}", version, stability_label(stability));
    }
    Ok(())
}
