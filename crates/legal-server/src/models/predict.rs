//! Prediction request/response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::prompt::{trim_message, EMPTY_MESSAGE_REPLY};

/// Prediction request.
///
/// `message` accepts any JSON value. A missing key and `null` both read as
/// an empty message.
#[derive(Debug, Default, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub message: Option<Value>,
}

impl PredictRequest {
    /// The message as text with surrounding whitespace removed.
    ///
    /// Strings are used verbatim; other values use their compact JSON form.
    pub fn message_text(&self) -> String {
        match &self.message {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => trim_message(s).to_string(),
            Some(other) => trim_message(&other.to_string()).to_string(),
        }
    }
}

/// Prediction response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub response: String,
}

impl PredictResponse {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }

    /// The fixed reply for an empty message.
    pub fn guidance() -> Self {
        Self::new(EMPTY_MESSAGE_REPLY)
    }
}
