use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::commands::spec::{CommandSpec, OutputTarget};
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;

/// Longest stderr excerpt copied into an error detail.
const STDERR_EXCERPT_LEN: usize = 512;

/// Result of a finished external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output, empty unless the command used [`OutputTarget::Capture`].
    pub stdout: String,
    /// Captured standard error, empty when the command appended it to a file.
    pub stderr: String,
}

impl CommandOutput {
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes external commands.
///
/// Implementations report a command that ran, whatever its exit code, as `Ok`. Only a command
/// that could not be started is an error.
pub trait CommandRunner {
    fn run(&self, command: &CommandSpec) -> impl Future<Output = EtlResult<CommandOutput>> + Send;
}

/// Fails with [`ErrorKind::CommandFailed`] unless `output` reports success.
pub fn require_success(command: &CommandSpec, output: &CommandOutput) -> EtlResult<()> {
    if output.success() {
        return Ok(());
    }

    let status = match output.code {
        Some(code) => format!("exit code {code}"),
        None => "a signal".to_owned(),
    };
    let mut detail = format!("`{command}` terminated with {status}");
    let stderr = output.stderr.trim();
    if !stderr.is_empty() {
        let excerpt: String = stderr.chars().take(STDERR_EXCERPT_LEN).collect();
        detail.push_str(": ");
        detail.push_str(&excerpt);
    }

    Err(etl_error!(
        ErrorKind::CommandFailed,
        "External command failed",
        detail = detail
    ))
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    async fn open_output(path: &Path, append: bool) -> EtlResult<std::fs::File> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .await
            .map_err(|err| {
                etl_error!(
                    ErrorKind::IoError,
                    "Command output file could not be opened",
                    path.display(),
                    source: err
                )
            })?;

        Ok(file.into_std().await)
    }
}

impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> EtlResult<CommandOutput> {
        let mut command = Command::new(spec.program());
        command
            .args(spec.exposed_args())
            .envs(spec.get_env().iter().map(|(name, value)| (name, value)))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(command = %spec, "running external command");

        let spawn_failed = |err: std::io::Error| {
            etl_error!(
                ErrorKind::CommandFailed,
                "External command could not be started",
                spec.program(),
                source: err
            )
        };

        let output = match spec.get_output() {
            OutputTarget::Capture => {
                let output = command.output().await.map_err(spawn_failed)?;
                CommandOutput {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                }
            }
            OutputTarget::File(path) => {
                let file = Self::open_output(path, false).await?;
                // `output()` would reset stdout to a pipe.
                let child = command
                    .stdout(Stdio::from(file))
                    .stderr(Stdio::piped())
                    .spawn()
                    .map_err(spawn_failed)?;
                let output = child.wait_with_output().await?;
                CommandOutput {
                    code: output.status.code(),
                    stdout: String::new(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                }
            }
            OutputTarget::AppendFile(path) => {
                let file = Self::open_output(path, true).await?;
                let stderr = file.try_clone()?;
                let status = command
                    .stdout(Stdio::from(file))
                    .stderr(Stdio::from(stderr))
                    .status()
                    .await
                    .map_err(spawn_failed)?;
                CommandOutput {
                    code: status.code(),
                    ..CommandOutput::default()
                }
            }
        };

        if !output.success() {
            warn!(command = %spec, code = ?output.code, "external command failed");
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_detail_carries_the_redacted_command_and_stderr() {
        let command = CommandSpec::new("hive").option("-f", "/tmp/base.sql");
        let output = CommandOutput {
            code: Some(64),
            stdout: String::new(),
            stderr: "FAILED: ParseException line 1:0\n".to_owned(),
        };

        let err = require_success(&command, &output).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CommandFailed);
        assert_eq!(
            err.detail(),
            Some("`hive -f /tmp/base.sql` terminated with exit code 64: FAILED: ParseException line 1:0")
        );
        assert!(require_success(&command, &CommandOutput::with_code(0)).is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_output_is_captured() {
        let command = CommandSpec::new("sh").arg("-c").arg("echo out; echo err >&2; exit 3");

        let output = ProcessRunner.run(&command).await.unwrap();

        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn appended_output_accumulates() {
        let path = std::env::temp_dir().join(format!("runner-{}.out", uuid::Uuid::new_v4()));
        let command = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo line")
            .output(OutputTarget::AppendFile(path.clone()));

        ProcessRunner.run(&command).await.unwrap();
        ProcessRunner.run(&command).await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "line\nline\n");
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_output_receives_stdout_only() {
        let path = std::env::temp_dir().join(format!("runner-{}.sql", uuid::Uuid::new_v4()));
        let command = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo 'CREATE TABLE t (id INT);'; echo warning >&2")
            .output(OutputTarget::File(path.clone()));

        let output = ProcessRunner.run(&command).await.unwrap();

        assert!(output.success());
        assert_eq!(output.stderr, "warning\n");
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            "CREATE TABLE t (id INT);\n"
        );
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_program_cannot_start() {
        let command = CommandSpec::new(format!("no-such-program-{}", uuid::Uuid::new_v4()));

        let err = ProcessRunner.run(&command).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CommandFailed);
    }
}
