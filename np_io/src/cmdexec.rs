//! Composable execution of external programs.
//!
//! An [`ExecOptions`] value describes how a program is launched (working
//! directory, environment, output handling). Values are built with named
//! setters and composed with [`ExecOptions::merge`], where the later value
//! wins every conflict. A [`CommandExecutor`] carries options plus a
//! [`ProcessRunner`]; production code uses [`SystemRunner`], tests use
//! [`FakeRunner`] so that no real program is ever started.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use np_core::Error;

/// What happens to a child's stdout or stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Output {
    /// Share the parent's stream.
    #[default]
    Inherit,
    /// Collect into [`CommandOutput`].
    Capture,
    /// Send to the null device.
    Discard,
}

impl Output {
    fn stdio(self) -> Stdio {
        match self {
            Output::Inherit => Stdio::inherit(),
            Output::Capture => Stdio::piped(),
            Output::Discard => Stdio::null(),
        }
    }
}

/// Launch settings. Unset fields defer to whatever they are merged onto.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    current_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    clear_env: Option<bool>,
    stdout: Option<Output>,
    stderr: Option<Output>,
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Start the child from an empty environment instead of the parent's.
    pub fn clear_env(mut self, clear: bool) -> Self {
        self.clear_env = Some(clear);
        self
    }

    pub fn stdout(mut self, mode: Output) -> Self {
        self.stdout = Some(mode);
        self
    }

    pub fn stderr(mut self, mode: Output) -> Self {
        self.stderr = Some(mode);
        self
    }

    /// Compose `self` with `later`; `later` is applied last and wins.
    pub fn merge(&self, later: &ExecOptions) -> ExecOptions {
        let mut env = self.env.clone();
        env.extend(later.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        ExecOptions {
            current_dir: later.current_dir.clone().or_else(|| self.current_dir.clone()),
            env,
            clear_env: later.clear_env.or(self.clear_env),
            stdout: later.stdout.or(self.stdout),
            stderr: later.stderr.or(self.stderr),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn clears_env(&self) -> bool {
        self.clear_env.unwrap_or(false)
    }

    pub fn stdout_mode(&self) -> Output {
        self.stdout.unwrap_or_default()
    }

    pub fn stderr_mode(&self) -> Output {
        self.stderr.unwrap_or_default()
    }
}

/// A fully resolved request to run one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub options: ExecOptions,
}

impl Invocation {
    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    pub fn command_line(&self) -> String {
        self.argv().join(" ")
    }
}

/// Result of a finished process. `exit_code` is `None` when the process was
/// killed by a signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Successful exit with the given stdout.
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        CommandOutput {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// Failed exit with the given code and stderr.
    pub fn exit(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        CommandOutput {
            exit_code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Starts processes. Returns the raw outcome; exit status is judged by
/// [`CommandExecutor`].
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, Error>;
}

/// Runs real processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, Error> {
        let options = &invocation.options;
        let mut command = tokio::process::Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(options.stdout_mode().stdio())
            .stderr(options.stderr_mode().stdio());

        if let Some(dir) = options.dir() {
            command.current_dir(dir);
        }
        if options.clears_env() {
            command.env_clear();
        }
        command.envs(options.vars());

        let child = command.spawn().map_err(|e| Error::SpawnFailed {
            command: invocation.program.clone(),
            message: e.to_string(),
        })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::SpawnFailed {
                command: invocation.program.clone(),
                message: e.to_string(),
            })?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Options plus a runner. Cheap to clone; [`CommandExecutor::with`] derives a
/// new executor and leaves the original untouched.
#[derive(Clone)]
pub struct CommandExecutor {
    runner: Arc<dyn ProcessRunner>,
    options: ExecOptions,
}

impl CommandExecutor {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            options: ExecOptions::default(),
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemRunner))
    }

    /// A new executor whose options are the current ones merged with `options`.
    pub fn with(&self, options: ExecOptions) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            options: self.options.merge(&options),
        }
    }

    /// Run `program` with `args`. A non-zero exit is an error carrying the
    /// command line, the exit code and whatever stderr was captured.
    pub async fn run<I, S>(&self, program: &str, args: I) -> Result<CommandOutput, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = Invocation {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            options: self.options.clone(),
        };

        debug!(
            command = %invocation.command_line(),
            dir = ?invocation.options.dir(),
            "running command"
        );

        let output = self.runner.run(&invocation).await?;
        if !output.success() {
            return Err(Error::CommandFailed {
                command: invocation.command_line(),
                code: output.exit_code,
                stderr: output.stderr_str(),
            });
        }

        Ok(output)
    }
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct FakeState {
    fakes: Vec<(Vec<String>, CommandOutput)>,
    invocations: Vec<Invocation>,
}

/// Test double that records every invocation and never starts a process.
///
/// Invocations whose full argument vector (program and arguments) equals a
/// registered one get the registered output; everything else succeeds with
/// empty output.
#[derive(Debug, Clone, Default)]
pub struct FakeRunner {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the output returned for an exact argument vector. Later
    /// registrations of the same vector take precedence.
    pub fn on<I, S>(&self, argv: I, output: CommandOutput) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv = argv.into_iter().map(Into::into).collect();
        self.lock().fakes.push((argv, output));
        self
    }

    /// An executor backed by this runner.
    pub fn executor(&self) -> CommandExecutor {
        CommandExecutor::new(Arc::new(self.clone()))
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.lock().invocations.clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.lock()
            .invocations
            .iter()
            .map(Invocation::command_line)
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, Error> {
        let argv = invocation.argv();
        let mut state = self.lock();
        state.invocations.push(invocation.clone());

        Ok(state
            .fakes
            .iter()
            .rev()
            .find(|(registered, _)| *registered == argv)
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok(Vec::new())))
    }
}
