//! Building PHP extensions from source.
//!
//! The build flow is:
//! 1. Load the package manifest
//! 2. Check the PHP version and extension dependencies
//! 3. Ask for configure options the caller did not supply
//! 4. phpize, configure, make (skipped when the module is already built)
//! 5. make install
//! 6. make clean, when requested

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use np_core::{Error, Manifest, derive_flag, missing_options, parse_package_xml};

use crate::cmdexec::{CommandExecutor, ExecOptions};
use crate::traits::{ManifestLoader, Prompt, RuntimeProbe};

pub const DEFAULT_CFLAGS: &str =
    "-fstack-protector-strong -fpic -fpie -O2 -D_LARGEFILE_SOURCE -D_FILE_OFFSET_BITS=64";
pub const DEFAULT_LDFLAGS: &str = "-Wl,-O1 -Wl,--hash-style=both -pie";

/// Toolchain environment shared by every build step.
///
/// Captured once and shared read-only between concurrent builds; the process
/// environment is not otherwise passed to the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnvironment {
    /// Search path for phpize, make and the compiler
    pub path: String,
    /// C compiler flags (`PHP_CFLAGS`)
    pub cflags: String,
    /// Preprocessor flags (`PHP_CPPFLAGS`)
    pub cppflags: String,
    /// Linker flags (`PHP_LDFLAGS`)
    pub ldflags: String,
    /// php-config found on `path`
    pub php_config: Option<PathBuf>,
}

impl BuildEnvironment {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Flags that are unset or
    /// blank fall back to the hardened defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let path = lookup("PATH").unwrap_or_default();
        let php_config = find_in_path(&path, "php-config");

        Self {
            cflags: flag("PHP_CFLAGS", DEFAULT_CFLAGS),
            cppflags: flag("PHP_CPPFLAGS", DEFAULT_CFLAGS),
            ldflags: flag("PHP_LDFLAGS", DEFAULT_LDFLAGS),
            php_config,
            path,
        }
    }

    pub fn with_php_config(mut self, php_config: impl Into<PathBuf>) -> Self {
        self.php_config = Some(php_config.into());
        self
    }

    /// Environment overlay for a build step. `parallel > 1` adds `MAKEFLAGS`.
    pub fn overlay(&self, parallel: usize) -> ExecOptions {
        let options = ExecOptions::new()
            .clear_env(true)
            .env("PATH", &self.path)
            .env("CFLAGS", &self.cflags)
            .env("CPPFLAGS", &self.cppflags)
            .env("LDFLAGS", &self.ldflags);

        if parallel > 1 {
            options.env("MAKEFLAGS", format!("-j{}", parallel))
        } else {
            options
        }
    }
}

fn find_in_path(path: &str, program: &str) -> Option<PathBuf> {
    std::env::split_paths(path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// What to build and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Extracted source tree (contains config.m4)
    pub source_dir: PathBuf,
    /// Staging root passed to `make install` as `INSTALL_ROOT`
    pub install_dir: Option<PathBuf>,
    pub manifest_path: PathBuf,
    /// Configure arguments; answers to prompted options are appended
    pub configure_args: Vec<String>,
    /// Parallel make jobs
    pub parallel: usize,
    /// Run `make clean` after installing
    pub cleanup: bool,
}

impl BuildRequest {
    /// Request for a source tree whose manifest sits at its root.
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        let source_dir = source_dir.into();
        Self {
            manifest_path: source_dir.join("package.xml"),
            source_dir,
            install_dir: None,
            configure_args: Vec::new(),
            parallel: 1,
            cleanup: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Phpize,
    Configure,
    Make,
    MakeInstall,
    MakeClean,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStep::Phpize => "phpize",
            BuildStep::Configure => "configure",
            BuildStep::Make => "make",
            BuildStep::MakeInstall => "make install",
            BuildStep::MakeClean => "make clean",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub package: String,
    /// False when an existing module was installed without recompiling
    pub compiled: bool,
}

/// Drives the build of one extension.
#[derive(Clone)]
pub struct Builder {
    env: Arc<BuildEnvironment>,
    executor: CommandExecutor,
    loader: Arc<dyn ManifestLoader>,
    prompt: Arc<dyn Prompt>,
    runtime: Arc<dyn RuntimeProbe>,
}

impl Builder {
    pub fn new(
        env: Arc<BuildEnvironment>,
        executor: CommandExecutor,
        loader: Arc<dyn ManifestLoader>,
        prompt: Arc<dyn Prompt>,
        runtime: Arc<dyn RuntimeProbe>,
    ) -> Self {
        Self {
            env,
            executor,
            loader,
            prompt,
            runtime,
        }
    }

    /// Build and install. Prompted configure answers are appended to
    /// `request.configure_args`.
    pub async fn build(&self, request: &mut BuildRequest) -> Result<BuildReport, Error> {
        let manifest = self.loader.load(&request.manifest_path)?;
        debug!(package = %manifest.name, version = %manifest.version, "loaded manifest");

        self.check_dependencies(&manifest).await?;
        self.resolve_configure_args(&manifest, &mut request.configure_args)
            .await?;

        let executor = self.executor.with(
            self.env
                .overlay(request.parallel)
                .current_dir(&request.source_dir),
        );

        let artifact = request
            .source_dir
            .join("modules")
            .join(format!("{}.so", manifest.name));
        let compiled = !artifact.exists();

        if compiled {
            self.compile(&executor, request).await?;
        } else {
            info!(artifact = %artifact.display(), "module already built, skipping compilation");
        }

        let mut install_args = Vec::new();
        if let Some(root) = &request.install_dir {
            install_args.push(format!("INSTALL_ROOT={}", root.display()));
        }
        install_args.push("install".to_string());
        run_step(&executor, BuildStep::MakeInstall, "make", install_args).await?;

        if request.cleanup {
            run_step(&executor, BuildStep::MakeClean, "make", ["clean".to_string()]).await?;
        }

        Ok(BuildReport {
            package: manifest.name,
            compiled,
        })
    }

    async fn compile(&self, executor: &CommandExecutor, request: &BuildRequest) -> Result<(), Error> {
        run_step(executor, BuildStep::Phpize, "phpize", Vec::new()).await?;

        let php_config = self
            .env
            .php_config
            .as_ref()
            .ok_or_else(|| Error::BuildStepFailed {
                step: BuildStep::Configure.to_string(),
                source: Box::new(Error::SpawnFailed {
                    command: "php-config".to_string(),
                    message: "not found on PATH".to_string(),
                }),
            })?;

        let mut args = request.configure_args.clone();
        args.push(format!("--with-php-config={}", php_config.display()));
        run_step(executor, BuildStep::Configure, "./configure", args).await?;

        run_step(executor, BuildStep::Make, "make", Vec::new()).await
    }

    async fn check_dependencies(&self, manifest: &Manifest) -> Result<(), Error> {
        if !manifest.php.is_empty() {
            let current = self.runtime.version().await?;
            if !manifest.php.matches(&current) {
                return Err(Error::RuntimeVersionMismatch {
                    current,
                    requirement: manifest.php.describe(),
                });
            }
            debug!(php = %current, requirement = %manifest.php.describe(), "php version ok");
        }

        for ext in &manifest.required_extensions {
            if !self.runtime.is_extension_enabled(&ext.name).await? {
                return Err(Error::MissingExtension {
                    name: ext.name.clone(),
                });
            }
        }

        for ext in &manifest.optional_extensions {
            if !self.runtime.is_extension_enabled(&ext.name).await? {
                info!(
                    package = %manifest.name,
                    extension = %ext.name,
                    "optional extension is not enabled"
                );
            }
        }

        Ok(())
    }

    async fn resolve_configure_args(
        &self,
        manifest: &Manifest,
        args: &mut Vec<String>,
    ) -> Result<(), Error> {
        let missing: Vec<_> = missing_options(&manifest.configure_options, args)
            .into_iter()
            .cloned()
            .collect();

        for option in missing {
            let question = if option.prompt.trim().is_empty() {
                option.name.clone()
            } else {
                option.prompt.trim().to_string()
            };
            let answer = self.ask(question, option.default.clone()).await?;
            let flag = derive_flag(&option.name, answer.trim());
            debug!(option = %option.name, flag = %flag, "configure option");
            args.push(flag);
        }

        Ok(())
    }

    /// Prompts read the terminal, so they run on the blocking pool.
    async fn ask(&self, question: String, default: String) -> Result<String, Error> {
        let prompt = Arc::clone(&self.prompt);
        match tokio::task::spawn_blocking(move || prompt.prompt(&question, &default)).await {
            Ok(answer) => answer,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(Error::PromptFailure {
                message: format!("prompt task failed: {e}"),
            }),
        }
    }
}

async fn run_step<I>(
    executor: &CommandExecutor,
    step: BuildStep,
    program: &str,
    args: I,
) -> Result<(), Error>
where
    I: IntoIterator<Item = String>,
{
    debug!(%step, "running build step");
    executor
        .run(program, args)
        .await
        .map(|_| ())
        .map_err(|e| Error::BuildStepFailed {
            step: step.to_string(),
            source: Box::new(e),
        })
}

/// Reads `package.xml` from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageXmlLoader;

impl ManifestLoader for PackageXmlLoader {
    fn load(&self, path: &Path) -> Result<Manifest, Error> {
        let failure = |message: String| Error::ManifestFailure {
            path: path.to_path_buf(),
            message,
        };

        let xml = std::fs::read_to_string(path).map_err(|e| failure(e.to_string()))?;
        parse_package_xml(&xml).map_err(|e| failure(e.to_string()))
    }
}
