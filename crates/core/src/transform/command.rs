//! Executor that runs transforms as child processes.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::config::ExecutorConfig;
use super::error::TransformError;
use super::traits::TransformExecutor;

/// Runs transform programs with `tokio::process`.
///
/// The child is spawned with `kill_on_drop`, so aborting the owning task
/// terminates the process even if the cancellation token is never observed.
pub struct CommandExecutor {
    config: ExecutorConfig,
}

impl CommandExecutor {
    /// Creates a new executor with the given configuration.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Creates an executor with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ExecutorConfig::default())
    }

    fn build_command(&self, program: &str, args: &[String]) -> Command {
        let mut command = Command::new(self.config.resolve_program(program));
        command
            .args(args)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

/// Concatenates stdout and stderr into one reason string.
fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut output = String::from_utf8_lossy(stdout).to_string();
    output.push_str(&String::from_utf8_lossy(stderr));
    output.trim_end().to_string()
}

#[async_trait]
impl TransformExecutor for CommandExecutor {
    fn name(&self) -> &str {
        "command"
    }

    async fn execute(
        &self,
        program: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), TransformError> {
        let start = Instant::now();
        tracing::debug!(program, ?args, "Running transform");

        let child = self.build_command(program, args).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TransformError::ProgramNotFound {
                    program: program.to_string(),
                }
            } else {
                TransformError::Io(e)
            }
        })?;

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            output = child.wait_with_output() => output?,
            _ = cancel.cancelled() => {
                tracing::warn!(program, "Transform cancelled, killing process");
                return Err(TransformError::Cancelled);
            }
        };

        if !output.status.success() {
            let reason = combined_output(&output.stdout, &output.stderr);
            tracing::debug!(
                program,
                code = ?output.status.code(),
                "Transform exited with failure"
            );
            return Err(TransformError::failed(output.status.code(), reason));
        }

        tracing::debug!(
            program,
            duration_ms = start.elapsed().as_millis() as u64,
            "Transform finished"
        );
        Ok(())
    }
}
