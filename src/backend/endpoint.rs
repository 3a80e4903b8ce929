use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;

use super::{parse_output, with_deadline, Backend, BackendError, BackendPaths};

#[derive(Serialize)]
struct AskPayload<'a> {
    question: &'a str,
    config_path: &'a Path,
    questions_path: &'a Path,
    schema_path: &'a Path,
}

/// POSTs each question to a backend that is already running as a web service.
pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
    paths: BackendPaths,
    timeout: Option<Duration>,
}

impl HttpBackend {
    pub fn new(
        url: impl Into<String>,
        paths: BackendPaths,
        timeout: Option<Duration>,
    ) -> Result<Self, BackendError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(BackendError::MissingUrl);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain"));

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            url,
            paths,
            timeout,
        })
    }

    async fn post(&self, question: &str) -> Result<Value, BackendError> {
        let payload = AskPayload {
            question,
            config_path: &self.paths.config_path,
            questions_path: &self.paths.questions_path,
            schema_path: &self.paths.schema_path,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read response body>".to_string());
            return Err(BackendError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let body = body.trim();
        if body.is_empty() {
            return Err(BackendError::EmptyOutput);
        }

        Ok(parse_output(body))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn ask(&self, question: &str) -> Result<Value, BackendError> {
        with_deadline(self.timeout, self.post(question)).await
    }

    fn mode(&self) -> &'static str {
        "http"
    }
}
