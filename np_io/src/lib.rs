pub mod api;
pub mod build;
pub mod cmdexec;
pub mod fetch;
pub mod install;
pub mod resolver;
pub mod runtime;
pub mod traits;
pub mod ui;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use api::PeclClient;
pub use build::{
    BuildEnvironment, BuildReport, BuildRequest, BuildStep, Builder, PackageXmlLoader,
};
pub use cmdexec::{
    CommandExecutor, CommandOutput, ExecOptions, FakeRunner, Invocation, Output, ProcessRunner,
    SystemRunner,
};
pub use fetch::ArchiveFetcher;
pub use install::{
    Downloaded, InstallOptions, Installed, Installer, PackageSpec, default_parallelism,
};
pub use resolver::VersionResolver;
pub use runtime::PhpRuntime;
pub use traits::{
    ArchiveStream, ManifestLoader, Prompt, ReleaseClient, RuntimeProbe, TransportError,
};
pub use ui::{InteractivePrompt, NonInteractivePrompt};
