use async_trait::async_trait;
use rig::{client::CompletionClient, completion::Prompt, providers::openrouter};
use std::sync::Arc;
use tracing::{error, info, warn};
use walkthrough_flow::Context;

use crate::error::{Result, WalkthroughError};

pub const DEFAULT_CHAT_MODEL: &str = "openai/gpt-4o-mini";

pub const CHAT_SYSTEM_PROMPT: &str = "You are a friendly genetics tutor helping someone explore a gene variant. \
Explain ideas in plain language, keep answers short and encouraging, and define any technical term you use. \
You do not give medical advice; suggest talking to a genetic counselor or doctor for personal health questions.";

/// Appended to every assistant reply.
pub const REFERENCE_LINKS: &str = "\n\n**Learn more:**\n\
- MedlinePlus Genetics: https://medlineplus.gov/genetics/\n\
- NCBI Gene: https://www.ncbi.nlm.nih.gov/gene/\n\
- ClinVar: https://www.ncbi.nlm.nih.gov/clinvar/\n\
- Ensembl: https://www.ensembl.org/";

/// What the chat knows about the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatContext {
    pub gene: Option<String>,
    pub variant: Option<String>,
}

/// Hosted language model: system instruction and prompt in, text out.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> anyhow::Result<String>;
}

/// OpenRouter-backed provider
pub struct OpenRouterChat {
    client: openrouter::Client,
    model: String,
}

impl OpenRouterChat {
    pub fn new(api_key: &str, model: impl Into<String>) -> Self {
        Self {
            client: openrouter::Client::new(api_key),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenRouterChat {
    async fn complete(&self, system: &str, prompt: &str) -> anyhow::Result<String> {
        let agent = self.client.agent(&self.model).preamble(system).build();
        let response = agent.prompt(prompt).await?;
        Ok(response)
    }
}

/// Forwards questions to the provider and keeps the session transcript.
pub struct ChatProxy {
    provider: Option<Arc<dyn ChatProvider>>,
}

impl ChatProxy {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Chat without a provider; every question is answered with a
    /// configuration error.
    pub fn disabled() -> Self {
        Self { provider: None }
    }

    /// OpenRouter provider when a key is configured, disabled otherwise.
    pub fn from_api_key(api_key: Option<&str>, model: &str) -> Self {
        match api_key.map(str::trim).filter(|key| !key.is_empty()) {
            Some(key) => {
                info!(model = %model, "Chat enabled");
                Self::new(Arc::new(OpenRouterChat::new(key, model)))
            }
            None => {
                warn!("OPENROUTER_API_KEY not set, chat is disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn build_prompt(question: &str, context: &ChatContext) -> String {
        let gene = context.gene.as_deref().unwrap_or("not provided yet");
        let variant = context.variant.as_deref().unwrap_or("not provided yet");
        format!(
            "The user is exploring a gene variant.\n\
             Gene: {}\n\
             Variant: {}\n\n\
             Question: {}\n\n\
             Answer in a few short paragraphs.",
            gene,
            variant,
            question.trim()
        )
    }

    /// Ask a question. The question and the reply (or the error shown to the
    /// user) are appended to `transcript` in that order.
    pub async fn ask(
        &self,
        question: &str,
        context: &ChatContext,
        transcript: &Context,
    ) -> Result<String> {
        transcript.add_user_message(question).await;

        let Some(provider) = &self.provider else {
            let err = WalkthroughError::ConfigError(
                "chat is disabled because OPENROUTER_API_KEY is not set".to_string(),
            );
            transcript.add_assistant_message(err.to_string()).await;
            return Err(err);
        };

        let prompt = Self::build_prompt(question, context);
        match provider.complete(CHAT_SYSTEM_PROMPT, &prompt).await {
            Ok(reply) => {
                let reply = format!("{}{}", reply, REFERENCE_LINKS);
                transcript.add_assistant_message(reply.clone()).await;
                Ok(reply)
            }
            Err(e) => {
                error!(error = %e, "Chat provider failed");
                let err = WalkthroughError::UpstreamError(e.to_string());
                transcript.add_assistant_message(err.to_string()).await;
                Err(err)
            }
        }
    }
}
