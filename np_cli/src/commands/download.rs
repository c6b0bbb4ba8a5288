//! Download command implementation.

use std::time::Instant;

use np_io::{InstallOptions, Installer, PackageSpec};

use crate::display::{done, format_elapsed, format_specs, step};

pub async fn run(
    installer: &Installer,
    specs: &[PackageSpec],
    options: &InstallOptions,
) -> Result<(), np_core::Error> {
    let start = Instant::now();
    step(format!("Downloading {}", format_specs(specs)));

    let downloaded = match specs {
        [spec] => vec![installer.download(spec, options).await?],
        _ => installer.download_many(specs, options).await?,
    };

    for item in &downloaded {
        done(format!(
            "{} {} -> {}",
            item.name,
            item.version,
            item.path.display()
        ));
    }
    step(format!(
        "Downloaded {} package(s) in {}",
        downloaded.len(),
        format_elapsed(start.elapsed())
    ));
    Ok(())
}
