//! Main Entrypoint for the Colloquy API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Building the language model client, speech adapters and session store.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use colloquy_api::{
    config::{Config, TtsProvider},
    router::create_router,
    state::AppState,
};
use colloquy_core::{
    llm_client::{GenerationParams, LLMClient, OpenAICompatibleClient},
    memory::DEFAULT_MEMORY_TURNS,
    prompt::PromptRegistry,
    session::SessionStore,
    synthesis::{DEFAULT_LANGUAGE, GoogleTranslateSynthesizer, OpenAISpeechSynthesizer, Synthesizer},
    transcription::{Transcriber, WhisperTranscriber},
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

fn build_synthesizer(config: &Config) -> anyhow::Result<Arc<dyn Synthesizer>> {
    Ok(match config.tts_provider {
        TtsProvider::Google => {
            info!("Using Google Translate TTS.");
            Arc::new(GoogleTranslateSynthesizer::new())
        }
        TtsProvider::OpenAI => {
            info!(model = %config.tts_model, voice = %config.tts_voice, "Using OpenAI TTS.");
            let api_key = config
                .tts_api_key
                .clone()
                .context("TTS_API_KEY is required for the OpenAI TTS provider")?;
            Arc::new(OpenAISpeechSynthesizer::new(
                config.tts_base_url.clone(),
                api_key,
                config.tts_model.clone(),
                config.tts_voice.clone(),
            ))
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    tokio::fs::create_dir_all(&config.temp_dir)
        .await
        .with_context(|| format!("Failed to create temp dir {}", config.temp_dir.display()))?;

    // --- 3. Initialize Shared Services ---
    let llm_config = OpenAIConfig::new()
        .with_api_key(&config.llm_api_key)
        .with_api_base(&config.llm_base_url);
    let llm_client: Arc<dyn LLMClient> =
        Arc::new(OpenAICompatibleClient::new(llm_config, config.llm_timeout));

    let mut stt_config = OpenAIConfig::new().with_api_base(&config.stt_base_url);
    if let Some(key) = &config.stt_api_key {
        stt_config = stt_config.with_api_key(key);
    }
    let transcriber: Arc<dyn Transcriber> = Arc::new(WhisperTranscriber::new(
        stt_config,
        config.stt_model.clone(),
        DEFAULT_LANGUAGE.to_string(),
    ));

    let synthesizer = build_synthesizer(&config)?;

    let sessions = Arc::new(SessionStore::new(
        llm_client,
        GenerationParams::new(config.chat_model.clone()),
        DEFAULT_MEMORY_TURNS,
    ));

    let app_state = Arc::new(AppState {
        prompts: Arc::new(PromptRegistry::builtin()),
        sessions,
        transcriber,
        synthesizer,
        temp_dir: config.temp_dir.clone(),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        llm_base_url = %config.llm_base_url,
        model = %config.chat_model,
        tts_provider = ?config.tts_provider,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
