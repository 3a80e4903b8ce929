use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    /// Absent and `null` both count as an empty message.
    #[serde(default)]
    pub message: Option<String>,
}

/// Envelope for every `/api/chat` reply, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
}

impl ChatResponse {
    pub fn answered(answer: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(answer.into()),
            error: None,
            user_message: Some(user_message.into()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            user_message: None,
        }
    }

    pub fn with_user_message(mut self, user_message: impl Into<String>) -> Self {
        self.user_message = Some(user_message.into());
        self
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub initialized: bool,
    pub status: &'static str,
}
