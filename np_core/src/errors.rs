use std::fmt;
use std::path::PathBuf;

use crate::stability::Stability;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    PackageNotFound {
        name: String,
    },
    ReleaseNotFound {
        name: String,
        version: String,
    },
    CategoryNotFound {
        category: String,
    },
    NoMatchingVersion {
        name: String,
        constraint: String,
        minimum_stability: Stability,
    },
    InvalidConstraint {
        constraint: String,
        reason: String,
    },
    InvalidStability {
        value: String,
    },
    NetworkFailure {
        message: String,
    },
    ProtocolFailure {
        message: String,
    },
    UnsupportedContent {
        detected: String,
    },
    TruncatedEntry {
        path: String,
        expected: u64,
        actual: u64,
    },
    UnsafeEntryPath {
        path: String,
    },
    RuntimeVersionMismatch {
        current: String,
        requirement: String,
    },
    MissingExtension {
        name: String,
    },
    RuntimeProbeFailure {
        message: String,
    },
    ManifestFailure {
        path: PathBuf,
        message: String,
    },
    PromptFailure {
        message: String,
    },
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    SpawnFailed {
        command: String,
        message: String,
    },
    BuildStepFailed {
        step: String,
        source: Box<Error>,
    },
    FileSystem {
        path: PathBuf,
        message: String,
    },
    Cancelled {
        name: String,
    },
    /// Wraps an error with the operation and the package/version it concerns.
    Context {
        operation: String,
        subject: String,
        source: Box<Error>,
    },
    BatchFailed {
        failures: Vec<Error>,
        cancelled: Vec<String>,
    },
}

impl Error {
    pub fn context(self, operation: impl Into<String>, subject: impl Into<String>) -> Self {
        Error::Context {
            operation: operation.into(),
            subject: subject.into(),
            source: Box::new(self),
        }
    }

    pub fn fs(path: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
        Error::FileSystem {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Innermost error, skipping every `Context` and `BuildStepFailed` layer.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Context { source, .. } | Error::BuildStepFailed { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self.root_cause(), Error::Cancelled { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PackageNotFound { name } => {
                write!(
                    f,
                    "package '{}' not found\n  hint: run 'notpecl info {}' to check the name",
                    name, name
                )
            }
            Error::ReleaseNotFound { name, version } => {
                write!(f, "release {} of '{}' not found", version, name)
            }
            Error::CategoryNotFound { category } => {
                write!(f, "category '{}' not found", category)
            }
            Error::NoMatchingVersion {
                name,
                constraint,
                minimum_stability,
            } => {
                write!(
                    f,
                    "no version of '{}' satisfies constraint \"{}\" at minimum stability {}",
                    name, constraint, minimum_stability
                )?;
                if *minimum_stability > Stability::Snapshot {
                    write!(
                        f,
                        "\n  hint: try a lower --minimum-stability to include pre-releases"
                    )?;
                }
                Ok(())
            }
            Error::InvalidConstraint { constraint, reason } => {
                write!(f, "invalid version constraint \"{}\": {}", constraint, reason)
            }
            Error::InvalidStability { value } => {
                write!(
                    f,
                    "unsupported stability '{}'\n  hint: use one of stable, beta, alpha, devel, snapshot",
                    value
                )
            }
            Error::NetworkFailure { message } => {
                write!(
                    f,
                    "network error: {}\n  hint: check your internet connection and try again",
                    message
                )
            }
            Error::ProtocolFailure { message } => {
                write!(f, "unexpected registry response: {}", message)
            }
            Error::UnsupportedContent { detected } => {
                write!(
                    f,
                    "downloaded archive is not gzip-compressed (looks like {})",
                    detected
                )
            }
            Error::TruncatedEntry {
                path,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "file '{}' is {} bytes long, but only {} read from the archive\n  hint: this may indicate a corrupted download; try again",
                    path, expected, actual
                )
            }
            Error::UnsafeEntryPath { path } => {
                write!(f, "archive entry '{}' escapes the extraction directory", path)
            }
            Error::RuntimeVersionMismatch {
                current,
                requirement,
            } => {
                write!(
                    f,
                    "current php version is {}, required {}",
                    current, requirement
                )
            }
            Error::MissingExtension { name } => {
                write!(
                    f,
                    "extension '{}' is required but is not enabled\n  hint: install and enable '{}' first",
                    name, name
                )
            }
            Error::RuntimeProbeFailure { message } => {
                write!(f, "could not inspect the php runtime: {}", message)
            }
            Error::ManifestFailure { path, message } => {
                write!(f, "failed to load {}: {}", path.display(), message)
            }
            Error::PromptFailure { message } => {
                write!(f, "prompt failed: {}", message)
            }
            Error::CommandFailed {
                command,
                code,
                stderr,
            } => {
                match code {
                    Some(code) => write!(f, "command '{}' exited with code {}", command, code)?,
                    None => write!(f, "command '{}' was terminated by a signal", command)?,
                }
                let stderr = stderr.trim();
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
            Error::SpawnFailed { command, message } => {
                write!(
                    f,
                    "could not start '{}': {}\n  hint: make sure it is installed and on PATH",
                    command, message
                )
            }
            Error::BuildStepFailed { step, source } => {
                write!(f, "failed to run {}: {}", step, source)
            }
            Error::FileSystem { path, message } => {
                write!(f, "{}: {}", path.display(), message)
            }
            Error::Cancelled { name } => {
                write!(f, "{} was cancelled after a sibling failure", name)
            }
            Error::Context {
                operation,
                subject,
                source,
            } => {
                write!(f, "failed to {} {}: {}", operation, subject, source)
            }
            Error::BatchFailed {
                failures,
                cancelled,
            } => {
                write!(f, "{} package(s) failed", failures.len())?;
                if !cancelled.is_empty() {
                    write!(f, ", {} cancelled ({})", cancelled.len(), cancelled.join(", "))?;
                }
                for failure in failures {
                    write!(f, "\n  - {}", failure)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Context { source, .. } | Error::BuildStepFailed { source, .. } => {
                Some(source.as_ref())
            }
            _ => None,
        }
    }
}
