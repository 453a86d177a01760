use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use super::RetrievedChunk;
use crate::credentials::CredentialProvider;
use crate::error::{RagError, Result};

/// Returned without calling the language model when nothing was retrieved.
pub const NO_CONTEXT_ANSWER: &str =
    "I'm sorry, I couldn't find any relevant information to answer your query.";

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that provides accurate and concise answers based on the provided context. \
If the answer is not contained within the context, respond with 'I don't know.'";

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
}

/// A chat-completion backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

pub struct AnswerSynthesizer {
    completion: Arc<dyn CompletionService>,
    model: Option<String>,
}

impl AnswerSynthesizer {
    pub fn new(completion: Arc<dyn CompletionService>, model: Option<String>) -> Self {
        Self {
            completion,
            model: model.filter(|m| !m.trim().is_empty()),
        }
    }

    /// Answer `query` from `retrieved` only.
    ///
    /// Empty context short-circuits to `NO_CONTEXT_ANSWER`. A missing
    /// completion model is a `ModelLoad` error, and completion failures are
    /// returned as they are, so an empty answer never stands in for a failure.
    pub async fn synthesize(&self, query: &str, retrieved: &[RetrievedChunk]) -> Result<String> {
        if retrieved.is_empty() {
            tracing::info!("No relevant documents found for the query");
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let request = self.build_request(query, retrieved)?;

        tracing::debug!(
            model = %request.model,
            chunks = retrieved.len(),
            context_chars = request.user.len(),
            "Requesting grounded completion"
        );

        let answer = self.completion.complete(&request).await.map_err(|e| {
            tracing::error!(error = %e, "Completion request failed");
            e
        })?;

        Ok(answer)
    }

    pub fn build_request(&self, query: &str, retrieved: &[RetrievedChunk]) -> Result<CompletionRequest> {
        let model = self
            .model
            .clone()
            .ok_or_else(|| RagError::ModelLoad("No completion model configured".to_string()))?;

        Ok(CompletionRequest {
            model,
            system: SYSTEM_PROMPT.to_string(),
            user: format!("Context: {}\n\nQuestion: {}", build_context(retrieved), query),
        })
    }
}

/// Chunk texts in the given order, separated by a blank line.
pub fn build_context(retrieved: &[RetrievedChunk]) -> String {
    retrieved
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Chat completions over the OpenAI REST API.
///
/// The API key is fetched for every request, so a missing key fails that
/// request only.
pub struct OpenAiCompletionService {
    api_base: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl OpenAiCompletionService {
    pub fn new(api_base: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            api_base: api_base.into(),
            credentials,
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let api_key = self.credentials.api_key().await;
        if api_key.is_empty() {
            return Err(RagError::Upstream(
                "No API key available for the completion service".to_string(),
            ));
        }

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(self.api_base.as_str());
        let client = Client::with_config(config);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.clone())
                .build()
                .map_err(|e| RagError::Upstream(format!("Failed to build system message: {}", e)))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.user.clone())
                .build()
                .map_err(|e| RagError::Upstream(format!("Failed to build user message: {}", e)))?
                .into(),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(request.model.clone())
            .messages(messages)
            .build()
            .map_err(|e| RagError::Upstream(format!("Failed to build chat request: {}", e)))?;

        let response = client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| RagError::Upstream(format!("Chat completion failed: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::Upstream("Completion returned no content".to_string()))
    }
}
