//! Prompt Template Registry
//!
//! A fixed, read-only set of conversation personas. Each template renders into
//! the message list sent to the language model: the persona as a system
//! message, the rolling history in chronological order, then the current turn.

use crate::memory::RollingMemory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Placeholder inside a turn template that is replaced by the user's text.
pub const INPUT_PLACEHOLDER: &str = "{input}";

pub const BUS_STAND_SMALL_TALK: &str = "Small talk between two strangers at a bus stand";
pub const CO_WORKER: &str = "Talking to your co-worker";
pub const NETWORKING_EVENT: &str = "Conversing with a person in a professional networking event";

const BUS_STAND_PERSONA: &str =
    "You are 'Sam', a business analyst on your way to work on a cloudy day.";

const CO_WORKER_PERSONA: &str = "Be a conversational AI assistant that behaves like a human. \
Act like a highly motivated and results-oriented professional. Your personality is known for its \
positive attitude, strong work ethic, and eagerness to learn new things. You recently landed a new \
project that you are very excited about.\n\n\
AVOID GENERATING responses that include stage directions like \"*adjusts his glasses accordingly*\" \
and so on. Avoid generating long responses and going off topic from the conversation.";

const NETWORKING_PERSONA: &str = "The following is a conversation between a human and an AI. \
The AI is named Sam and acts like a person in a professional networking event. The AI is \
professional, friendly and a knowledgeable person.\n\
AVOID GENERATING responses that include stage directions like \"*adjusts his glasses accordingly*\" \
and so on. Avoid generating long responses and going off topic from the conversation.";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("Invalid prompt template: '{0}'")]
    UnknownTemplate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single message handed to the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A persona plus the shape of the human turn.
///
/// Templates hold no per-turn state. The current user text is supplied to
/// [`PromptTemplate::render`] on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: String,
    pub persona: String,
    pub turn_template: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persona: persona.into(),
            turn_template: INPUT_PLACEHOLDER.to_string(),
        }
    }

    /// Builds the full message list for one turn.
    pub fn render(&self, history: &RollingMemory, input: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::system(self.persona.clone()));
        for turn in history.iter() {
            messages.push(ChatMessage::user(turn.user.clone()));
            messages.push(ChatMessage::assistant(turn.assistant.clone()));
        }
        messages.push(ChatMessage::user(
            self.turn_template.replace(INPUT_PLACEHOLDER, input),
        ));
        messages
    }
}

/// Lookup table from human-readable template name to template.
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    templates: BTreeMap<String, Arc<PromptTemplate>>,
}

impl PromptRegistry {
    /// The three predefined personas.
    pub fn builtin() -> Self {
        let templates = [
            PromptTemplate::new(BUS_STAND_SMALL_TALK, BUS_STAND_PERSONA),
            PromptTemplate::new(CO_WORKER, CO_WORKER_PERSONA),
            PromptTemplate::new(NETWORKING_EVENT, NETWORKING_PERSONA),
        ]
        .into_iter()
        .map(|t| (t.name.clone(), Arc::new(t)))
        .collect();
        Self { templates }
    }

    pub fn get(&self, name: &str) -> Result<Arc<PromptTemplate>, PromptError> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| PromptError::UnknownTemplate(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }
}
