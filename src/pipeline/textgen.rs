//! Text-generation collaborator
//!
//! The trait is the seam the orchestrator depends on; the HTTP
//! implementation talks to a chat-completion style endpoint. No retries
//! here: callers treat any failure as a fallback case.

use super::classify::Classification;
use super::mailbox::MailMessage;
use super::orchestrator::Priority;
use super::CollaboratorError;
use crate::aggregator::Snapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[async_trait]
pub trait TextEngine: Send + Sync {
    /// Generate a short display quote from the sensor snapshot
    async fn generate_quote(
        &self,
        snapshot: &Snapshot,
        class: &Classification,
    ) -> Result<String, CollaboratorError>;

    /// Summarize unread messages in one or two sentences
    async fn summarize_messages(
        &self,
        messages: &[MailMessage],
    ) -> Result<String, CollaboratorError>;

    /// Classify overall display priority from conditions and inbox
    async fn classify_priority(
        &self,
        snapshot: &Snapshot,
        messages: &[MailMessage],
    ) -> Result<Priority, CollaboratorError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Chat-completion backed implementation of [`TextEngine`]
pub struct HttpTextEngine {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpTextEngine {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    async fn complete(&self, prompt: String) -> Result<String, CollaboratorError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::Http(format!(
                "text engine returned {}",
                response.status()
            )));
        }

        let body: ChatResponse = response.json().await?;
        let text = body
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(CollaboratorError::Malformed("empty completion".to_string()));
        }

        Ok(text)
    }
}

#[async_trait]
impl TextEngine for HttpTextEngine {
    async fn generate_quote(
        &self,
        snapshot: &Snapshot,
        class: &Classification,
    ) -> Result<String, CollaboratorError> {
        let prompt = format!(
            "Write one short, uplifting line for a hallway display. \
             Current indoor conditions: {} ({}). \
             Reply with the line only, no quotes around it.",
            snapshot.describe(),
            class.summary()
        );
        self.complete(prompt).await
    }

    async fn summarize_messages(
        &self,
        messages: &[MailMessage],
    ) -> Result<String, CollaboratorError> {
        let listing = messages
            .iter()
            .map(|m| format!("- {}: {}", m.subject, m.snippet))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Summarize these unread emails in at most two short sentences \
             for a glanceable display:\n{}",
            listing
        );
        self.complete(prompt).await
    }

    async fn classify_priority(
        &self,
        snapshot: &Snapshot,
        messages: &[MailMessage],
    ) -> Result<Priority, CollaboratorError> {
        let subjects = messages
            .iter()
            .map(|m| m.subject.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        let prompt = format!(
            "Given indoor conditions ({}) and unread email subjects ({}), \
             answer with exactly one word: normal, warning, or urgent.",
            snapshot.describe(),
            subjects
        );

        let answer = self.complete(prompt).await?;
        Ok(Priority::parse(&answer))
    }
}
