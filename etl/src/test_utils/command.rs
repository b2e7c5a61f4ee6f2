use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::{CommandOutput, CommandRunner, CommandSpec, OutputTarget};
use crate::error::EtlResult;

/// A command seen by a [`RecordingRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub program: String,
    /// Arguments as the process would receive them, secrets included.
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub output: OutputTarget,
    /// Command line with secrets redacted.
    pub rendered: String,
}

impl RecordedCommand {
    /// Returns the value following `flag`.
    pub fn option(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|index| self.args.get(index + 1))
            .map(String::as_str)
    }
}

#[derive(Debug, Default)]
struct Inner {
    commands: Vec<RecordedCommand>,
    exit_codes: HashMap<String, VecDeque<i32>>,
    file_contents: Vec<(String, String)>,
}

/// Command runner recording every command instead of spawning it.
///
/// Commands succeed unless an exit code was queued for their program. Commands writing their
/// output to a file can be given the content to write.
#[derive(Debug, Clone, Default)]
pub struct RecordingRunner {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next run of `program` exit with `code`.
    pub async fn queue_exit_code(&self, program: &str, code: i32) {
        self.inner
            .lock()
            .await
            .exit_codes
            .entry(program.to_owned())
            .or_default()
            .push_back(code);
    }

    /// Writes `content` to the output file of every command passing `argument`.
    pub async fn write_output_for(&self, argument: &str, content: impl Into<String>) {
        self.inner
            .lock()
            .await
            .file_contents
            .push((argument.to_owned(), content.into()));
    }

    pub async fn commands(&self) -> Vec<RecordedCommand> {
        self.inner.lock().await.commands.clone()
    }

    pub async fn programs(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .commands
            .iter()
            .map(|command| command.program.clone())
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &CommandSpec) -> EtlResult<CommandOutput> {
        let args: Vec<String> = command
            .exposed_args()
            .into_iter()
            .map(str::to_owned)
            .collect();

        let (code, content) = {
            let mut inner = self.inner.lock().await;
            inner.commands.push(RecordedCommand {
                program: command.program().to_owned(),
                args: args.clone(),
                env: command.get_env().to_vec(),
                output: command.get_output().clone(),
                rendered: command.to_string(),
            });

            let code = inner
                .exit_codes
                .get_mut(command.program())
                .and_then(VecDeque::pop_front)
                .unwrap_or(0);
            let content = inner
                .file_contents
                .iter()
                .find(|(argument, _)| args.contains(argument))
                .map(|(_, content)| content.clone());

            (code, content)
        };

        let target: Option<PathBuf> = match command.get_output() {
            OutputTarget::File(path) | OutputTarget::AppendFile(path) => Some(path.clone()),
            OutputTarget::Capture => None,
        };
        if let (Some(path), Some(content)) = (target, content) {
            tokio::fs::write(&path, content).await?;
        }

        Ok(CommandOutput::with_code(code))
    }
}
