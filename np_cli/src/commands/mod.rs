pub mod build;
pub mod download;
pub mod info;
pub mod install;

use std::path::PathBuf;
use std::sync::Arc;

use console::Term;

use np_io::{
    BuildEnvironment, Builder, CommandExecutor, InteractivePrompt, NonInteractivePrompt,
    PackageXmlLoader, PhpRuntime, Prompt,
};

pub fn default_download_dir() -> PathBuf {
    std::env::temp_dir().join("notpecl")
}

/// Builder wired to the real toolchain. Prompts only when stdout is a terminal.
pub fn builder() -> Builder {
    let executor = CommandExecutor::system();
    let prompt: Arc<dyn Prompt> = if Term::stdout().is_term() {
        Arc::new(InteractivePrompt::stdio())
    } else {
        Arc::new(NonInteractivePrompt)
    };

    Builder::new(
        Arc::new(BuildEnvironment::from_env()),
        executor.clone(),
        Arc::new(PackageXmlLoader),
        prompt,
        Arc::new(PhpRuntime::new(executor)),
    )
}
