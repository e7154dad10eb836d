//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared
//! conversation store and the speech adapters handed to every handler.

use colloquy_core::{
    prompt::PromptRegistry, session::SessionStore, synthesis::Synthesizer,
    transcription::Transcriber,
};
use std::path::PathBuf;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub prompts: Arc<PromptRegistry>,
    pub sessions: Arc<SessionStore>,
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn Synthesizer>,
    /// Where uploaded and synthesized audio is staged.
    pub temp_dir: PathBuf,
}
