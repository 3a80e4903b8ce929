use serde_json::Value;

const SUCCESS_STATUS: &str = "success";

/// A backend result, decoded into the one shape the gateway understands.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendReply {
    /// `{"status": "success", "answer": ...}`
    Answered { answer: String },
    /// Anything else: error mappings, plain strings, numbers, `null`.
    Raw(Value),
}

impl BackendReply {
    /// Only a JSON object qualifies as structured; arrays and scalars stay raw.
    pub fn decode(value: Value) -> Self {
        let answer = match &value {
            Value::Object(map)
                if map.get("status").and_then(Value::as_str) == Some(SUCCESS_STATUS) =>
            {
                map.get("answer").map(render_raw)
            }
            _ => None,
        };

        match answer {
            Some(answer) => Self::Answered { answer },
            None => Self::Raw(value),
        }
    }

    /// The text shown to the user. Never fails.
    pub fn into_text(self) -> String {
        match self {
            Self::Answered { answer } => answer,
            Self::Raw(value) => render_raw(&value),
        }
    }
}

/// Textual form of a raw backend value: strings verbatim, everything else as
/// compact JSON.
pub fn render_raw(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
