use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backends for speech synthesis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    Google,
    OpenAI,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub chat_model: String,
    pub llm_timeout: Duration,
    pub stt_base_url: String,
    pub stt_api_key: Option<String>,
    pub stt_model: String,
    pub tts_provider: TtsProvider,
    pub tts_base_url: String,
    pub tts_api_key: Option<String>,
    pub tts_model: String,
    pub tts_voice: String,
    pub temp_dir: PathBuf,
    pub log_level: Level,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:8000");
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let llm_base_url = var_or("LLM_BASE_URL", "http://localhost:11434/v1");
        let llm_api_key = var_or("LLM_API_KEY", "ollama");
        let chat_model = var_or("CHAT_MODEL", "llama2:chat");

        let timeout_str = var_or("LLM_TIMEOUT_SECS", "120");
        let llm_timeout = timeout_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "LLM_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                )
            })?;

        let stt_base_url = var_or("STT_BASE_URL", "https://api.openai.com/v1");
        let stt_api_key = std::env::var("STT_API_KEY").ok();
        let stt_model = var_or("STT_MODEL", "whisper-1");

        let provider_str = var_or("TTS_PROVIDER", "google");
        let tts_provider = match provider_str.to_lowercase().as_str() {
            "google" => TtsProvider::Google,
            "openai" => TtsProvider::OpenAI,
            other => {
                return Err(ConfigError::InvalidValue(
                    "TTS_PROVIDER".to_string(),
                    format!("'{}' is not one of 'google', 'openai'", other),
                ));
            }
        };
        let tts_base_url = var_or("TTS_BASE_URL", "https://api.openai.com/v1");
        let tts_api_key = std::env::var("TTS_API_KEY").ok();
        let tts_model = var_or("TTS_MODEL", "tts-1");
        let tts_voice = var_or("TTS_VOICE", "alloy");

        if tts_provider == TtsProvider::OpenAI && tts_api_key.is_none() {
            return Err(ConfigError::MissingVar(
                "TTS_API_KEY must be set for 'openai' TTS provider".to_string(),
            ));
        }

        let temp_dir = std::env::var("TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            llm_base_url,
            llm_api_key,
            chat_model,
            llm_timeout,
            stt_base_url,
            stt_api_key,
            stt_model,
            tts_provider,
            tts_base_url,
            tts_api_key,
            tts_model,
            tts_voice,
            temp_dir,
            log_level,
        })
    }
}
