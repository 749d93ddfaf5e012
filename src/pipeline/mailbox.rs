//! Mailbox collaborator
//!
//! Narrow interface over an unread-mail source. The HTTP implementation
//! expects a REST surface returning unread messages as JSON; it reports
//! itself disabled unless both the endpoint and a bearer token are
//! configured, in which case the pipeline skips the fetch entirely.

use super::CollaboratorError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// One unread message, reduced to what the display summary needs
#[derive(Debug, Clone, Deserialize)]
pub struct MailMessage {
    pub subject: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub from: Option<String>,
}

#[async_trait]
pub trait Mailbox: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Fetch up to `max` unread messages, newest first
    async fn fetch_unread(&self, max: usize) -> Result<Vec<MailMessage>, CollaboratorError>;
}

/// REST-backed implementation of [`Mailbox`]
pub struct HttpMailbox {
    client: reqwest::Client,
    base_url: Option<String>,
    token: Option<String>,
}

impl HttpMailbox {
    pub fn new(base_url: Option<String>, token: Option<String>) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
            token,
        })
    }
}

#[async_trait]
impl Mailbox for HttpMailbox {
    fn is_enabled(&self) -> bool {
        self.base_url.is_some() && self.token.is_some()
    }

    async fn fetch_unread(&self, max: usize) -> Result<Vec<MailMessage>, CollaboratorError> {
        let (base_url, token) = match (&self.base_url, &self.token) {
            (Some(url), Some(token)) => (url, token),
            _ => {
                return Err(CollaboratorError::Http(
                    "mailbox is not configured".to_string(),
                ))
            }
        };

        let url = format!("{}/messages/unread?limit={}", base_url, max);

        let response = self.client.get(&url).bearer_auth(token).send().await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::Http(format!(
                "mailbox returned {}",
                response.status()
            )));
        }

        let mut messages: Vec<MailMessage> = response.json().await?;
        messages.truncate(max);
        Ok(messages)
    }
}
