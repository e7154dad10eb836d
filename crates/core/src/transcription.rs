//! Speech recognition adapter.

use crate::audio;
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs},
};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

/// Turns a recorded audio file into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes the audio stored at `audio_path`.
    async fn transcribe(&self, audio_path: &Path) -> Result<String>;
}

/// A `Transcriber` backed by an OpenAI-compatible `/audio/transcriptions`
/// endpoint running a Whisper model.
///
/// Audio is normalized locally (16 kHz mono, one 30 second window) and sent
/// with temperature 0 so the model decodes greedily.
pub struct WhisperTranscriber {
    client: Client<OpenAIConfig>,
    model: String,
    language: String,
}

impl WhisperTranscriber {
    pub fn new(config: OpenAIConfig, model: String, language: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            language,
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let raw = tokio::fs::read(audio_path)
            .await
            .with_context(|| format!("Failed to read audio file {}", audio_path.display()))?;
        debug!(audio_bytes = raw.len(), "Normalizing audio for transcription");

        let wav = tokio::task::spawn_blocking(move || audio::prepare_for_whisper(&raw))
            .await
            .context("Audio normalization task panicked")??;

        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8("audio.wav".to_string(), wav))
            .model(&self.model)
            .language(&self.language)
            .temperature(0.0)
            .response_format(AudioResponseFormat::Json)
            .build()?;

        let response = self
            .client
            .audio()
            .transcribe(request)
            .await
            .context("Transcription request failed")?;

        let text = response.text.trim().to_string();
        info!(transcript = %text, "Transcription complete");
        Ok(text)
    }
}
