//! Shared test utilities: in-process fakes for the external collaborators and
//! a small multipart body builder.

#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use colloquy_api::{router::create_router, state::AppState};
use colloquy_core::{
    llm_client::{GenerationParams, LLMClient},
    memory::DEFAULT_MEMORY_TURNS,
    prompt::{ChatMessage, PromptRegistry},
    session::SessionStore,
    synthesis::Synthesizer,
    transcription::Transcriber,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const FAKE_MP3: &[u8] = b"ID3\x04\x00fake-mp3-frames";

/// Records every message list it is sent and answers "reply to: <last message>".
#[derive(Default)]
pub struct RecordingLLM {
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
    pub fail: bool,
}

impl RecordingLLM {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for RecordingLLM {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _params: &GenerationParams,
    ) -> Result<String> {
        if self.fail {
            return Err(anyhow!("model backend unreachable"));
        }
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.calls.lock().unwrap().push(messages);
        Ok(format!("reply to: {last}"))
    }
}

/// A transcriber that remembers which files it was handed and whether they
/// existed at the time.
pub struct FakeTranscriber {
    result: std::result::Result<String, String>,
    pub seen: Mutex<Vec<(PathBuf, bool)>>,
}

impl FakeTranscriber {
    pub fn returning(text: &str) -> Self {
        Self {
            result: Ok(text.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<(PathBuf, bool)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        self.seen
            .lock()
            .unwrap()
            .push((audio_path.to_path_buf(), audio_path.exists()));
        self.result.clone().map_err(|e| anyhow!(e))
    }
}

pub struct FakeSynthesizer {
    pub fail: bool,
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, _language: &str) -> Result<Vec<u8>> {
        if self.fail || text.is_empty() {
            return Err(anyhow!("speech backend unreachable"));
        }
        Ok(FAKE_MP3.to_vec())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub llm: Arc<RecordingLLM>,
    pub transcriber: Arc<FakeTranscriber>,
    pub temp_dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(
            RecordingLLM::default(),
            FakeTranscriber::returning("Hello from audio"),
            FakeSynthesizer { fail: false },
        )
    }

    pub fn with(
        llm: RecordingLLM,
        transcriber: FakeTranscriber,
        synthesizer: FakeSynthesizer,
    ) -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let llm = Arc::new(llm);
        let transcriber = Arc::new(transcriber);

        let sessions = Arc::new(SessionStore::new(
            llm.clone(),
            GenerationParams::new("test-model"),
            DEFAULT_MEMORY_TURNS,
        ));
        let state = Arc::new(AppState {
            prompts: Arc::new(PromptRegistry::builtin()),
            sessions,
            transcriber: transcriber.clone(),
            synthesizer: Arc::new(synthesizer),
            temp_dir: temp_dir.path().to_path_buf(),
        });

        Self {
            router: create_router(state.clone()),
            state,
            llm,
            transcriber,
            temp_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should not fail")
    }

    pub fn temp_files(&self) -> usize {
        std::fs::read_dir(self.temp_dir.path()).unwrap().count()
    }
}

/// Builds `multipart/form-data` request bodies.
pub struct Form {
    boundary: &'static str,
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self {
            boundary: "colloquy-test-boundary",
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: audio/wav\r\n\r\n",
                self.boundary, name, filename
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// A text-in, text-out turn on the co-worker persona.
pub fn text_turn(conversation_id: &str, input: &str) -> Form {
    Form::new()
        .text("user_input", input)
        .text("input_method", "Text")
        .text("output_method", "Text")
        .text("prompt_template", "Talking to your co-worker")
        .text("conversation_id", conversation_id)
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
