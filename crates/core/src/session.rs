//! Conversation Session Store
//!
//! Conversations are created lazily on their first turn and live for the
//! lifetime of the process. The store owns every session, keyed by the
//! client-supplied conversation id.
//!
//! Two locks keep concurrent requests honest:
//!
//! - the store map is behind one async mutex, so lookup-or-create is atomic
//!   and two racing first turns always end up sharing one session;
//! - each session serializes its own turns, so the rolling memory is never
//!   updated by two model calls at once.

use crate::{
    llm_client::{GenerationParams, LLMClient},
    memory::{RollingMemory, Turn},
    prompt::PromptTemplate,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A conversation bound to one template, one model configuration and a
/// bounded history of past turns.
pub struct ConversationSession {
    id: String,
    template: Arc<PromptTemplate>,
    params: GenerationParams,
    llm_client: Arc<dyn LLMClient>,
    memory: Mutex<RollingMemory>,
    created_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(
        id: impl Into<String>,
        template: Arc<PromptTemplate>,
        params: GenerationParams,
        llm_client: Arc<dyn LLMClient>,
        memory_turns: usize,
    ) -> Self {
        Self {
            id: id.into(),
            template,
            params,
            llm_client,
            memory: Mutex::new(RollingMemory::new(memory_turns)),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn template(&self) -> &Arc<PromptTemplate> {
        &self.template
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Runs one turn against the model.
    ///
    /// The memory lock is held for the whole call so turns on the same
    /// conversation are applied in order. The turn is only remembered if the
    /// model call succeeds.
    pub async fn respond(&self, input: &str) -> Result<String> {
        let mut memory = self.memory.lock().await;
        let messages = self.template.render(&memory, input);
        debug!(
            conversation_id = %self.id,
            history_turns = memory.len(),
            "Invoking language model"
        );

        let reply = self.llm_client.complete(messages, &self.params).await?;
        memory.push(Turn::new(input, reply.clone()));
        Ok(reply)
    }

    /// A snapshot of the remembered turns, oldest first.
    pub async fn turns(&self) -> Vec<Turn> {
        self.memory.lock().await.to_vec()
    }
}

/// Owns every live conversation.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<ConversationSession>>>,
    llm_client: Arc<dyn LLMClient>,
    params: GenerationParams,
    memory_turns: usize,
}

impl SessionStore {
    /// Creates an empty store whose sessions talk to `llm_client` with `params`.
    pub fn new(llm_client: Arc<dyn LLMClient>, params: GenerationParams, memory_turns: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            llm_client,
            params,
            memory_turns,
        }
    }

    /// Returns the session for `conversation_id`, creating it with `template`
    /// if it does not exist yet.
    ///
    /// An existing session keeps the template it was created with, even when
    /// a different one is requested.
    pub async fn get_or_create(
        &self,
        conversation_id: &str,
        template: Arc<PromptTemplate>,
    ) -> Arc<ConversationSession> {
        let mut sessions = self.sessions.lock().await;

        if let Some(existing) = sessions.get(conversation_id) {
            if existing.template.name != template.name {
                warn!(
                    conversation_id,
                    bound_template = %existing.template.name,
                    requested_template = %template.name,
                    "Conversation already bound to a different template; keeping the original"
                );
            }
            return existing.clone();
        }

        let session = Arc::new(ConversationSession::new(
            conversation_id,
            template,
            self.params.clone(),
            self.llm_client.clone(),
            self.memory_turns,
        ));
        sessions.insert(conversation_id.to_string(), session.clone());
        info!(
            conversation_id,
            template = %session.template.name,
            model = %self.params.model,
            "Created conversation session"
        );
        session
    }

    pub async fn get(&self, conversation_id: &str) -> Option<Arc<ConversationSession>> {
        self.sessions.lock().await.get(conversation_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockLLMClient;
    use crate::memory::DEFAULT_MEMORY_TURNS;
    use crate::prompt::{CO_WORKER, ChatMessage, NETWORKING_EVENT, PromptRegistry};
    use anyhow::anyhow;

    /// A mock that echoes the last user message back.
    fn echo_client() -> Arc<dyn LLMClient> {
        let mut mock = MockLLMClient::new();
        mock.expect_complete().returning(|messages, _| {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(format!("echo: {last}"))
        });
        Arc::new(mock)
    }

    fn store_with(client: Arc<dyn LLMClient>) -> SessionStore {
        SessionStore::new(
            client,
            GenerationParams::new("llama2:chat"),
            DEFAULT_MEMORY_TURNS,
        )
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = store_with(echo_client());
        let template = PromptRegistry::builtin().get(CO_WORKER).unwrap();

        let first = store.get_or_create("abc", template.clone()).await;
        first.respond("Hello").await.unwrap();
        let second = store.get_or_create("abc", template).await;
        second.respond("Again").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len().await, 1);
        let turns = second.turns().await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].user, "Hello");
        assert_eq!(turns[1].user, "Again");
    }

    #[tokio::test]
    async fn test_memory_keeps_six_most_recent_turns_in_order() {
        let store = store_with(echo_client());
        let template = PromptRegistry::builtin().get(CO_WORKER).unwrap();
        let session = store.get_or_create("abc", template).await;

        for i in 0..9 {
            session.respond(&format!("message {i}")).await.unwrap();
        }

        let turns = session.turns().await;
        assert_eq!(turns.len(), 6);
        let users: Vec<String> = turns.iter().map(|t| t.user.clone()).collect();
        assert_eq!(
            users,
            (3..9).map(|i| format!("message {i}")).collect::<Vec<_>>()
        );
        assert_eq!(turns[5].assistant, "echo: message 8");
    }

    #[tokio::test]
    async fn test_history_is_sent_with_the_next_turn() {
        let mut mock = MockLLMClient::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("Hi!".to_string()));
        mock.expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|messages: &Vec<ChatMessage>, _| {
                messages.iter().any(|m| m.content == "Hello")
                    && messages.iter().any(|m| m.content == "Hi!")
            })
            .returning(|_, _| Ok("You said Hello.".to_string()));

        let store = store_with(Arc::new(mock));
        let template = PromptRegistry::builtin().get(CO_WORKER).unwrap();
        let session = store.get_or_create("abc", template).await;

        session.respond("Hello").await.unwrap();
        let reply = session.respond("What did I just say?").await.unwrap();
        assert_eq!(reply, "You said Hello.");
    }

    #[tokio::test]
    async fn test_generation_params_are_passed_to_client() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .withf(|_, params: &GenerationParams| {
                params.model == "llama2:chat" && params.temperature == 0.1 && params.top_k == 50
            })
            .returning(|_, _| Ok("ok".to_string()));

        let store = store_with(Arc::new(mock));
        let template = PromptRegistry::builtin().get(CO_WORKER).unwrap();
        let session = store.get_or_create("abc", template).await;
        assert_eq!(session.respond("hi").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_failed_model_call_is_not_remembered() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .returning(|_, _| Err(anyhow!("model unavailable")));

        let store = store_with(Arc::new(mock));
        let template = PromptRegistry::builtin().get(CO_WORKER).unwrap();
        let session = store.get_or_create("abc", template).await;

        assert!(session.respond("Hello").await.is_err());
        assert!(session.turns().await.is_empty());
    }

    #[tokio::test]
    async fn test_existing_session_keeps_original_template() {
        let store = store_with(echo_client());
        let registry = PromptRegistry::builtin();

        let first = store
            .get_or_create("abc", registry.get(CO_WORKER).unwrap())
            .await;
        let second = store
            .get_or_create("abc", registry.get(NETWORKING_EVENT).unwrap())
            .await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.template().name, CO_WORKER);
    }

    #[tokio::test]
    async fn test_distinct_ids_get_distinct_sessions() {
        let store = store_with(echo_client());
        let template = PromptRegistry::builtin().get(CO_WORKER).unwrap();

        let a = store.get_or_create("a", template.clone()).await;
        let b = store.get_or_create("b", template).await;
        a.respond("only for a").await.unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(b.turns().await.is_empty());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_turns_share_one_session() {
        let store = Arc::new(store_with(echo_client()));
        let template = PromptRegistry::builtin().get(CO_WORKER).unwrap();

        let mut handles = Vec::new();
        for i in 0..5 {
            let store = store.clone();
            let template = template.clone();
            handles.push(tokio::spawn(async move {
                let session = store.get_or_create("shared", template).await;
                session.respond(&format!("turn {i}")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 1);
        let session = store.get("shared").await.unwrap();
        assert_eq!(session.turns().await.len(), 5);
    }

    #[tokio::test]
    async fn test_get_unknown_conversation_returns_none() {
        let store = store_with(echo_client());
        assert!(store.get("missing").await.is_none());
        assert!(store.is_empty().await);
    }
}
