use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{FlowError, Result};

/// Author of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One entry of a session's chat transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-session key-value store shared by the tasks of a pipeline.
///
/// Cloning is cheap and every clone sees the same data. The chat transcript
/// is kept apart from the key-value data and can only be appended to.
#[derive(Clone, Debug)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
    transcript: Arc<RwLock<Vec<ChatMessage>>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            transcript: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value)
            .map_err(|e| FlowError::ContextError(format!("cannot store '{}': {}", key, e)))?;
        self.data.insert(key, value);
        Ok(())
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Like [`Context::get`] but a missing or mistyped key is an error.
    pub async fn require<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get(key)
            .await
            .ok_or_else(|| FlowError::ContextError(format!("{} not found", key)))
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub async fn clear(&self) {
        self.data.clear();
    }

    pub async fn add_user_message(&self, content: impl Into<String>) {
        self.transcript.write().await.push(ChatMessage::user(content));
    }

    pub async fn add_assistant_message(&self, content: impl Into<String>) {
        self.transcript
            .write()
            .await
            .push(ChatMessage::assistant(content));
    }

    pub async fn get_all_messages(&self) -> Vec<ChatMessage> {
        self.transcript.read().await.clone()
    }

    pub async fn message_count(&self) -> usize {
        self.transcript.read().await.len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_data() {
        let context = Context::new();
        let other = context.clone();

        context.set("gene", "NFIX").await.unwrap();
        let gene: String = other.get("gene").await.unwrap();
        assert_eq!(gene, "NFIX");

        other.remove("gene").await;
        assert!(!context.contains("gene").await);
    }

    #[tokio::test]
    async fn require_reports_missing_key() {
        let context = Context::new();
        let err = context.require::<String>("locus").await.unwrap_err();
        assert!(matches!(err, FlowError::ContextError(msg) if msg.contains("locus")));
    }

    #[tokio::test]
    async fn transcript_keeps_order_and_survives_clear() {
        let context = Context::new();
        context.add_user_message("What is a frameshift?").await;
        context.add_assistant_message("It shifts the reading frame.").await;
        context.clear().await;

        let messages = context.get_all_messages().await;
        assert_eq!(
            messages,
            vec![
                ChatMessage::user("What is a frameshift?"),
                ChatMessage::assistant("It shifts the reading frame."),
            ]
        );
    }
}
