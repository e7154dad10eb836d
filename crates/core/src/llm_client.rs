use crate::prompt::{ChatMessage, ChatRole};
use anyhow::{Context, Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_TOP_K: u32 = 50;

/// Sampling configuration bound to a conversation when it is created.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub top_k: u32,
}

impl GenerationParams {
    /// Parameters for `model` with the fixed conversational sampling settings.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// A generic client for interacting with an LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming completion call and returns the reply text.
    async fn complete(&self, messages: Vec<ChatMessage>, params: &GenerationParams)
    -> Result<String>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API
/// (OpenAI itself, Ollama's `/v1` endpoint, vLLM, ...).
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    timeout: Duration,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `timeout` - Upper bound on a single completion call.
    pub fn new(config: OpenAIConfig, timeout: Duration) -> Self {
        Self {
            client: Client::with_config(config),
            timeout,
        }
    }
}

fn to_openai_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let content = message.content.clone();
    Ok(match message.role {
        ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()?
            .into(),
    })
}

/// Builds the JSON body for a chat completion.
///
/// `top_k` is not part of the OpenAI schema, so it is merged into the
/// serialized request. Backends that do not understand it ignore it.
pub fn build_request_body(
    messages: &[ChatMessage],
    params: &GenerationParams,
) -> Result<serde_json::Value> {
    let messages = messages
        .iter()
        .map(to_openai_message)
        .collect::<Result<Vec<_>>>()?;

    let request = CreateChatCompletionRequestArgs::default()
        .model(&params.model)
        .messages(messages)
        .temperature(params.temperature)
        .build()?;

    let mut body = serde_json::to_value(&request)?;
    body["top_k"] = serde_json::json!(params.top_k);
    Ok(body)
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        params: &GenerationParams,
    ) -> Result<String> {
        let body = build_request_body(&messages, params)?;
        debug!(model = %params.model, messages = messages.len(), "Sending chat completion");

        let response: CreateChatCompletionResponse =
            tokio::time::timeout(self.timeout, self.client.chat().create_byot(body))
                .await
                .map_err(|_| anyhow!("Model call timed out after {:?}", self.timeout))??;

        let content = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .clone()
            .context("No content in LLM response")?;

        Ok(content.trim().to_string())
    }
}
