//! Text-to-speech adapters.

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::{debug, error};

pub const DEFAULT_LANGUAGE: &str = "en";

/// Longest piece of text the Google Translate TTS endpoint accepts per request.
pub const GOOGLE_TTS_MAX_CHARS: usize = 100;

const GOOGLE_TTS_URL: &str = "https://translate.google.com/translate_tts";

/// Converts text into MP3 audio.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>>;
}

/// Splits `text` into pieces of at most `max_chars` characters, breaking at
/// whitespace where possible.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_len
        } else {
            current.chars().count() + 1 + word_len
        };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Synthesizes speech through the public Google Translate TTS endpoint.
///
/// Long replies are sent in chunks and the returned MP3 streams are
/// concatenated.
pub struct GoogleTranslateSynthesizer {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleTranslateSynthesizer {
    pub fn new() -> Self {
        Self::with_base_url(GOOGLE_TTS_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

impl Default for GoogleTranslateSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for GoogleTranslateSynthesizer {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        let chunks = split_text(text, GOOGLE_TTS_MAX_CHARS);
        if chunks.is_empty() {
            bail!("No text to synthesize");
        }
        debug!(chunks = chunks.len(), %language, "Synthesizing speech");

        let total = chunks.len().to_string();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let response = self
                .client
                .get(&self.base_url)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", language),
                    ("q", chunk.as_str()),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                error!(%status, %body, "Google TTS error");
                bail!("Google TTS error {status}: {body}");
            }
            audio.extend_from_slice(&response.bytes().await?);
        }

        Ok(audio)
    }
}

/// Synthesizes speech through an OpenAI-compatible `/audio/speech` endpoint.
///
/// The endpoint detects the language from the text itself.
pub struct OpenAISpeechSynthesizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
}

impl OpenAISpeechSynthesizer {
    pub fn new(base_url: String, api_key: String, model: String, voice: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            voice,
        }
    }
}

#[async_trait]
impl Synthesizer for OpenAISpeechSynthesizer {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
        }

        if text.trim().is_empty() {
            bail!("No text to synthesize");
        }
        debug!(model = %self.model, voice = %self.voice, %language, "Synthesizing speech");

        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "OpenAI TTS error");
            bail!("OpenAI TTS error {status}: {body}");
        }

        Ok(response.bytes().await?.to_vec())
    }
}
