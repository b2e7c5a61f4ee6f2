use std::fmt;
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

const REDACTED: &str = "********";

/// One argument of an external command.
#[derive(Debug, Clone)]
pub enum CommandArg {
    Plain(String),
    /// Passed to the process as is, rendered redacted everywhere else.
    Secret(SecretString),
}

impl CommandArg {
    pub fn expose(&self) -> &str {
        match self {
            CommandArg::Plain(value) => value,
            CommandArg::Secret(value) => value.expose_secret(),
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, CommandArg::Secret(_))
    }
}

/// Where the standard output and error of a command go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Collected into the [`crate::commands::CommandOutput`].
    Capture,
    /// Standard output written to a file, truncating it first. Standard error is captured.
    File(PathBuf),
    /// Both streams appended to a file.
    AppendFile(PathBuf),
}

/// A fully resolved external command.
///
/// Requests for the external tools serialize themselves into a `CommandSpec`, which is the only
/// thing a [`crate::commands::CommandRunner`] sees.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: String,
    args: Vec<CommandArg>,
    env: Vec<(String, String)>,
    output: OutputTarget,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            output: OutputTarget::Capture,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(CommandArg::Plain(arg.into()));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(args.into_iter().map(|arg| CommandArg::Plain(arg.into())));
        self
    }

    /// Adds `flag` followed by `value`.
    pub fn option(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).arg(value)
    }

    /// Adds `flag` followed by a secret `value`.
    pub fn secret_option(mut self, flag: &str, value: SecretString) -> Self {
        self.args.push(CommandArg::Plain(flag.to_owned()));
        self.args.push(CommandArg::Secret(value));
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    pub fn output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[CommandArg] {
        &self.args
    }

    pub fn get_env(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn get_output(&self) -> &OutputTarget {
        &self.output
    }

    /// Arguments as passed to the process, secrets included.
    pub fn exposed_args(&self) -> Vec<&str> {
        self.args.iter().map(CommandArg::expose).collect()
    }
}

/// Renders the command line with secrets redacted and the output redirection shell style.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            match arg {
                CommandArg::Plain(value) => write!(f, " {value}")?,
                CommandArg::Secret(_) => write!(f, " {REDACTED}")?,
            }
        }
        match &self.output {
            OutputTarget::Capture => Ok(()),
            OutputTarget::File(path) => write!(f, " > {}", path.display()),
            OutputTarget::AppendFile(path) => write!(f, " >> {} 2>&1", path.display()),
        }
    }
}
