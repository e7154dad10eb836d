//! API Models
//!
//! Request and response payloads for the HTTP API, with `utoipa` schemas for
//! the generated OpenAPI document.

use axum::extract::{Multipart, multipart::MultipartError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use colloquy_core::memory::Turn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// How a turn arrives or how its reply should be delivered.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Text,
    Speech,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("'{0}' is not one of 'Text', 'Speech'")]
pub struct ParseModalityError(pub String);

impl FromStr for Modality {
    type Err = ParseModalityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Modality::Text),
            "speech" => Ok(Modality::Speech),
            _ => Err(ParseModalityError(s.to_string())),
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Text => write!(f, "Text"),
            Modality::Speech => write!(f, "Speech"),
        }
    }
}

/// The raw `multipart/form-data` fields of a `POST /process/` request.
///
/// Every field is optional at this stage; empty values are treated as absent.
#[derive(Debug, Default, Clone, ToSchema)]
pub struct TurnForm {
    /// Recorded speech (WAV), required when `input_method` is `Speech`.
    #[schema(value_type = Option<String>, format = Binary)]
    pub audio_file: Option<Bytes>,
    /// The user's message, required when `input_method` is `Text`.
    #[schema(example = "Hello")]
    pub user_input: Option<String>,
    #[schema(example = "Text")]
    pub input_method: Option<String>,
    #[schema(example = "Text")]
    pub output_method: Option<String>,
    #[schema(example = "Talking to your co-worker")]
    pub prompt_template: Option<String>,
    /// Identifies the conversation; a new one is started when omitted.
    #[schema(example = "abc")]
    pub conversation_id: Option<String>,
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

impl TurnForm {
    /// Reads all known fields from a multipart body. Unknown fields are skipped.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut form = TurnForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "audio_file" => {
                    let data = field.bytes().await?;
                    form.audio_file = (!data.is_empty()).then_some(data);
                }
                "user_input" => form.user_input = non_empty(field.text().await?),
                "input_method" => form.input_method = non_empty(field.text().await?),
                "output_method" => form.output_method = non_empty(field.text().await?),
                "prompt_template" => form.prompt_template = non_empty(field.text().await?),
                "conversation_id" => form.conversation_id = non_empty(field.text().await?),
                _ => {}
            }
        }
        Ok(form)
    }
}

/// The reply to a turn whose `output_method` is `Text`.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ProcessResponse {
    #[schema(example = "Hi! How is your week going?")]
    pub response: String,
    pub conversation_id: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct TurnView {
    pub user: String,
    pub assistant: String,
}

impl From<Turn> for TurnView {
    fn from(turn: Turn) -> Self {
        Self {
            user: turn.user,
            assistant: turn.assistant,
        }
    }
}

/// A snapshot of a live conversation.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ConversationView {
    pub conversation_id: String,
    #[schema(example = "Talking to your co-worker")]
    pub template: String,
    /// Remembered turns, oldest first.
    pub turns: Vec<TurnView>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
