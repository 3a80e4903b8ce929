//! The question-answering backend as seen from the gateway.
//!
//! The backend itself is an external program; this module only knows how to
//! reach it. Three transports are provided:
//!
//!   McpBackend:     MCP (JSON-RPC 2.0) over the stdio of a child process
//!   CommandBackend: one shell command per question
//!   HttpBackend:    one HTTP POST per question
//!
//! All of them are built through [`setup`], which is shared by the web server
//! and the `ask` subcommand.

mod command;
mod endpoint;
mod mcp;
pub mod protocol;
mod reply;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{BackendMode, BackendSettings};

pub use command::CommandBackend;
pub use endpoint::HttpBackend;
pub use mcp::McpBackend;
pub use reply::{render_raw, BackendReply};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{role} file not found: {}", .path.display())]
    MissingFile { role: &'static str, path: PathBuf },
    #[error("backend command is missing")]
    MissingCommand,
    #[error("backend URL is missing")]
    MissingUrl,
    #[error("backend call timed out after {} ms", .0.as_millis())]
    Timeout(Duration),
    #[error("failed to execute backend command: {0}")]
    SpawnFailure(#[source] std::io::Error),
    #[error("backend command exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("backend produced empty output")]
    EmptyOutput,
    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend request failed ({status}): {body}")]
    HttpStatus { status: u16, body: String },
    #[error("malformed backend message: {0}")]
    Protocol(String),
    #[error("backend closed the connection")]
    Closed,
    #[error("backend error {code}: {message}")]
    Rpc { code: i32, message: String },
    #[error("backend tool `{tool}` failed: {message}")]
    Tool { tool: String, message: String },
}

/// The three files the backend is configured from. Their formats belong to
/// the backend; the gateway only checks that they exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendPaths {
    pub config_path: PathBuf,
    pub questions_path: PathBuf,
    pub schema_path: PathBuf,
}

impl BackendPaths {
    pub fn verify(&self) -> Result<(), BackendError> {
        for (role, path) in [
            ("config", &self.config_path),
            ("questions", &self.questions_path),
            ("schema", &self.schema_path),
        ] {
            if !path.is_file() {
                return Err(BackendError::MissingFile {
                    role,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Ask one natural-language question and return the backend's raw result.
    async fn ask(&self, question: &str) -> Result<Value, BackendError>;

    fn mode(&self) -> &'static str;
}

/// Build and initialize the configured backend.
///
/// Must complete before the first `ask`; the server calls it before binding.
pub async fn setup(settings: &BackendSettings) -> Result<Arc<dyn Backend>, BackendError> {
    settings.paths.verify()?;

    let backend: Arc<dyn Backend> = match settings.mode {
        BackendMode::Mcp => Arc::new(
            McpBackend::spawn(&settings.command, &settings.paths, settings.timeout).await?,
        ),
        BackendMode::Command => Arc::new(CommandBackend::new(
            settings.command.clone(),
            settings.paths.clone(),
            settings.timeout,
        )?),
        BackendMode::Http => {
            let url = settings.url.clone().unwrap_or_default();
            Arc::new(HttpBackend::new(url, settings.paths.clone(), settings.timeout)?)
        }
    };

    tracing::info!(mode = backend.mode(), "backend initialized");
    Ok(backend)
}

/// Run `fut` under an optional deadline.
pub(crate) async fn with_deadline<T>(
    deadline: Option<Duration>,
    fut: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, BackendError> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| BackendError::Timeout(limit))?,
        None => fut.await,
    }
}

/// Parse backend output as JSON when it is JSON, otherwise keep it as text.
pub(crate) fn parse_output(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[test]
    fn verify_reports_first_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(&config_path, "db: {}\n").unwrap();

        let paths = BackendPaths {
            config_path,
            questions_path: dir.path().join("questions.yaml"),
            schema_path: dir.path().join("schema.yaml"),
        };

        match paths.verify() {
            Err(BackendError::MissingFile { role, path }) => {
                assert_eq!(role, "questions");
                assert_eq!(path, dir.path().join("questions.yaml"));
            }
            other => panic!("expected MissingFile, got {other:?}"),
        }
    }

    #[test]
    fn parse_output_prefers_json() {
        assert_eq!(
            parse_output(r#"{"status":"success","answer":"12345명"}"#),
            json!({"status": "success", "answer": "12345명"})
        );
        assert_eq!(parse_output("42"), json!(42));
        assert_eq!(
            parse_output("그런 데이터는 없습니다"),
            json!("그런 데이터는 없습니다")
        );
    }

    #[tokio::test]
    async fn deadline_expiry_is_a_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        };
        let result: Result<(), BackendError> =
            with_deadline(Some(Duration::from_millis(10)), slow).await;

        assert!(matches!(result, Err(BackendError::Timeout(_))));
    }
}
