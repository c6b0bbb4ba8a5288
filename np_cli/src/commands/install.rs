//! Install command implementation.

use std::time::Instant;

use console::style;

use np_io::{InstallOptions, Installer, PackageSpec};

use crate::display::{done, format_elapsed, format_specs, step};

pub async fn run(
    installer: &Installer,
    specs: &[PackageSpec],
    options: &InstallOptions,
) -> Result<(), np_core::Error> {
    let start = Instant::now();
    step(format!("Installing {}", format_specs(specs)));

    let installed = match specs {
        [spec] => vec![installer.install(spec, options).await?],
        _ => installer.install_many(specs, options).await?,
    };

    for item in &installed {
        let how = if item.compiled {
            style("built").green()
        } else {
            style("already built").dim()
        };
        done(format!("{} {} ({})", item.name, item.version, how));
    }
    step(format!(
        "Installed {} package(s) in {}",
        installed.len(),
        format_elapsed(start.elapsed())
    ));

    if let Some(dir) = &options.install_dir {
        println!("    staged under {}", dir.display());
    }
    Ok(())
}
