//! Colloquy Core
//!
//! Conversation logic with no HTTP awareness: prompt personas, rolling
//! memory, the session store, and the adapters for the language model,
//! speech recognition and speech synthesis.

pub mod audio;
pub mod llm_client;
pub mod memory;
pub mod prompt;
pub mod session;
pub mod synthesis;
pub mod transcription;
