use async_trait::async_trait;
use serde::de::DeserializeOwned;

use np_core::Error;

use crate::cmdexec::{CommandExecutor, ExecOptions, Output};
use crate::traits::RuntimeProbe;

/// Asks the `php` binary on PATH about itself.
#[derive(Debug, Clone)]
pub struct PhpRuntime {
    executor: CommandExecutor,
    binary: String,
}

impl PhpRuntime {
    pub fn new(executor: CommandExecutor) -> Self {
        Self::with_binary(executor, "php")
    }

    pub fn with_binary(executor: CommandExecutor, binary: impl Into<String>) -> Self {
        Self {
            executor: executor.with(
                ExecOptions::new()
                    .stdout(Output::Capture)
                    .stderr(Output::Capture),
            ),
            binary: binary.into(),
        }
    }

    async fn eval<T: DeserializeOwned>(&self, code: String) -> Result<T, Error> {
        let output = self
            .executor
            .run(&self.binary, ["-r".to_string(), code])
            .await
            .map_err(|e| Error::RuntimeProbeFailure {
                message: e.to_string(),
            })?;

        serde_json::from_slice(&output.stdout).map_err(|e| Error::RuntimeProbeFailure {
            message: format!(
                "unexpected output {:?}: {}",
                output.stdout_str().trim(),
                e
            ),
        })
    }
}

pub(crate) fn version_script() -> String {
    "echo json_encode(PHP_VERSION);".to_string()
}

pub(crate) fn extension_script(name: &str) -> String {
    format!(
        "echo json_encode(extension_loaded('{}'));",
        name.replace(['\\', '\''], "")
    )
}

#[async_trait]
impl RuntimeProbe for PhpRuntime {
    async fn version(&self) -> Result<String, Error> {
        self.eval(version_script()).await
    }

    async fn is_extension_enabled(&self, name: &str) -> Result<bool, Error> {
        self.eval(extension_script(name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmdexec::{CommandOutput, FakeRunner};

    #[tokio::test]
    async fn reports_version_from_json() {
        let fake = FakeRunner::new();
        fake.on(
            ["php", "-r", "echo json_encode(PHP_VERSION);"],
            CommandOutput::ok("\"8.2.10\""),
        );

        let runtime = PhpRuntime::new(fake.executor());
        assert_eq!(runtime.version().await.unwrap(), "8.2.10");
    }

    #[tokio::test]
    async fn probes_run_with_captured_output() {
        let fake = FakeRunner::new();
        fake.on(
            ["php", "-r", "echo json_encode(PHP_VERSION);"],
            CommandOutput::ok("\"8.1.0\""),
        );

        PhpRuntime::new(fake.executor()).version().await.unwrap();

        let invocation = &fake.invocations()[0];
        assert_eq!(invocation.options.stdout_mode(), Output::Capture);
    }

    #[tokio::test]
    async fn reports_extension_state() {
        let fake = FakeRunner::new();
        fake.on(
            ["php", "-r", "echo json_encode(extension_loaded('json'));"],
            CommandOutput::ok("true"),
        );
        fake.on(
            ["php", "-r", "echo json_encode(extension_loaded('igbinary'));"],
            CommandOutput::ok("false"),
        );

        let runtime = PhpRuntime::new(fake.executor());
        assert!(runtime.is_extension_enabled("json").await.unwrap());
        assert!(!runtime.is_extension_enabled("igbinary").await.unwrap());
    }

    #[test]
    fn extension_names_cannot_break_out_of_the_script() {
        assert_eq!(
            extension_script("x');system('id"),
            "echo json_encode(extension_loaded('x);system(id'));"
        );
    }

    #[tokio::test]
    async fn failed_php_is_probe_failure() {
        let fake = FakeRunner::new();
        fake.on(
            ["php", "-r", "echo json_encode(PHP_VERSION);"],
            CommandOutput::exit(255, "PHP Fatal error"),
        );

        let err = PhpRuntime::new(fake.executor()).version().await.unwrap_err();
        assert!(matches!(err, Error::RuntimeProbeFailure { .. }));
    }

    #[tokio::test]
    async fn garbage_output_is_probe_failure() {
        let fake = FakeRunner::new();
        fake.on(
            ["php", "-r", "echo json_encode(PHP_VERSION);"],
            CommandOutput::ok("Warning: something"),
        );

        let err = PhpRuntime::new(fake.executor()).version().await.unwrap_err();
        assert!(matches!(err, Error::RuntimeProbeFailure { .. }));
    }
}
