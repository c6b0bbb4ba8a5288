//! Installer module for notpecl
//!
//! Composes the version resolver, the archive fetcher and the build
//! orchestrator into one pipeline per package:
//!
//! - `batch` - Bounded fan-out over many packages with first-error cancellation

mod batch;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use np_core::{Constraint, Error, Stability};

use crate::build::{BuildRequest, Builder};
use crate::fetch::ArchiveFetcher;
use crate::resolver::VersionResolver;
use crate::traits::ReleaseClient;

/// Number of processing units, or 1 when it cannot be determined.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// A package name with an optional version constraint, written
/// `name[:constraint]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub constraint: String,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: constraint.into(),
        }
    }
}

impl FromStr for PackageSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, constraint) = s.split_once(':').unwrap_or((s, "*"));
        let name = name.trim();
        let constraint = match constraint.trim() {
            "" => "*",
            other => other,
        };

        if name.is_empty() {
            return Err(Error::InvalidConstraint {
                constraint: s.to_string(),
                reason: "missing package name".to_string(),
            });
        }
        Constraint::parse(constraint)?;

        Ok(PackageSpec::new(name, constraint))
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraint == "*" {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.name, self.constraint)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Where release archives are unpacked
    pub download_dir: PathBuf,
    /// Staging root for `make install`
    pub install_dir: Option<PathBuf>,
    pub minimum_stability: Stability,
    /// Configure arguments passed to every package
    pub configure_args: Vec<String>,
    /// Parallel make jobs per package
    pub parallel: usize,
    /// Run `make clean` and remove the unpacked sources after installing
    pub cleanup: bool,
    /// Packages processed at once
    pub concurrency: usize,
}

impl InstallOptions {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            install_dir: None,
            minimum_stability: Stability::Stable,
            configure_args: Vec::new(),
            parallel: default_parallelism(),
            cleanup: true,
            concurrency: default_parallelism(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    pub name: String,
    pub version: String,
    /// False when an already built module was reinstalled
    pub compiled: bool,
}

#[derive(Clone)]
pub struct Installer {
    resolver: VersionResolver,
    fetcher: ArchiveFetcher,
    builder: Builder,
}

impl Installer {
    pub fn new(client: Arc<dyn ReleaseClient>, builder: Builder) -> Self {
        Self {
            resolver: VersionResolver::new(Arc::clone(&client)),
            fetcher: ArchiveFetcher::new(client),
            builder,
        }
    }

    /// Resolve `spec` and unpack the chosen release.
    pub async fn download(
        &self,
        spec: &PackageSpec,
        options: &InstallOptions,
    ) -> Result<Downloaded, Error> {
        let version = self
            .resolver
            .resolve(&spec.name, &spec.constraint, options.minimum_stability)
            .await?;

        let path = self
            .fetcher
            .download(&spec.name, &version, &options.download_dir)
            .await?;

        info!(package = %spec.name, %version, path = %path.display(), "downloaded");
        Ok(Downloaded {
            name: spec.name.clone(),
            version,
            path,
        })
    }

    /// Resolve, download, build and install `spec`.
    pub async fn install(
        &self,
        spec: &PackageSpec,
        options: &InstallOptions,
    ) -> Result<Installed, Error> {
        let downloaded = self.download(spec, options).await?;
        let subject = format!("{} {}", downloaded.name, downloaded.version);

        let mut request = BuildRequest {
            source_dir: downloaded.path.clone(),
            install_dir: options.install_dir.clone(),
            manifest_path: downloaded.path.join("package.xml"),
            configure_args: options.configure_args.clone(),
            parallel: options.parallel,
            cleanup: options.cleanup,
        };

        let report = self
            .builder
            .build(&mut request)
            .await
            .map_err(|e| e.context("build", &subject))?;

        if options.cleanup {
            remove_sources(&downloaded.path).map_err(|e| e.context("clean up", &subject))?;
        }

        info!(package = %downloaded.name, version = %downloaded.version, "installed");
        Ok(Installed {
            name: downloaded.name,
            version: downloaded.version,
            compiled: report.compiled,
        })
    }

    /// Download every spec, at most `options.concurrency` at a time.
    /// Results follow the order of `specs`.
    pub async fn download_many(
        &self,
        specs: &[PackageSpec],
        options: &InstallOptions,
    ) -> Result<Vec<Downloaded>, Error> {
        let installer = self.clone();
        let options = Arc::new(options.clone());
        let concurrency = options.concurrency;

        batch::run(specs, concurrency, move |spec| {
            let installer = installer.clone();
            let options = Arc::clone(&options);
            async move { installer.download(&spec, &options).await }
        })
        .await
    }

    /// Install every spec, at most `options.concurrency` at a time.
    /// Results follow the order of `specs`.
    pub async fn install_many(
        &self,
        specs: &[PackageSpec],
        options: &InstallOptions,
    ) -> Result<Vec<Installed>, Error> {
        let installer = self.clone();
        let options = Arc::new(options.clone());
        let concurrency = options.concurrency;

        batch::run(specs, concurrency, move |spec| {
            let installer = installer.clone();
            let options = Arc::clone(&options);
            async move { installer.install(&spec, &options).await }
        })
        .await
    }
}

fn remove_sources(path: &Path) -> Result<(), Error> {
    std::fs::remove_dir_all(path).map_err(|e| Error::fs(path, e))?;
    debug!(path = %path.display(), "removed sources");
    Ok(())
}
