use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use super::{parse_output, with_deadline, Backend, BackendError, BackendPaths};

/// Runs `sh -c <command>` once per question.
///
/// The question and the three configuration paths are passed through the
/// environment as `CBCI_QUESTION`, `CBCI_CONFIG_PATH`, `CBCI_QUESTIONS_PATH`
/// and `CBCI_SCHEMA_PATH`. Stdout is the result.
pub struct CommandBackend {
    command: String,
    paths: BackendPaths,
    timeout: Option<Duration>,
}

impl CommandBackend {
    pub fn new(
        command: impl Into<String>,
        paths: BackendPaths,
        timeout: Option<Duration>,
    ) -> Result<Self, BackendError> {
        let command = command.into();
        if command.trim().is_empty() {
            return Err(BackendError::MissingCommand);
        }

        Ok(Self {
            command,
            paths,
            timeout,
        })
    }

    async fn run(&self, question: &str) -> Result<Value, BackendError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .env("CBCI_QUESTION", question)
            .env("CBCI_CONFIG_PATH", &self.paths.config_path)
            .env("CBCI_QUESTIONS_PATH", &self.paths.questions_path)
            .env("CBCI_SCHEMA_PATH", &self.paths.schema_path)
            .kill_on_drop(true);

        let output = cmd.output().await.map_err(BackendError::SpawnFailure)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(BackendError::NonZeroExit {
                code: output.status.code(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Err(BackendError::EmptyOutput);
        }

        Ok(parse_output(stdout))
    }
}

#[async_trait]
impl Backend for CommandBackend {
    async fn ask(&self, question: &str) -> Result<Value, BackendError> {
        with_deadline(self.timeout, self.run(question)).await
    }

    fn mode(&self) -> &'static str {
        "command"
    }
}
