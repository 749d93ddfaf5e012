//! Pipeline orchestrator
//!
//! Runs the enrichment fan-out once per trigger with isolated failure
//! domains: the quote is generated and published first (it has no other
//! dependency), the mailbox domain runs independently, and every display
//! topic ends the run holding either a real value or its fixed fallback
//! sentinel. A retrigger arriving while a run is in flight is dropped;
//! readiness is level-triggered so the next reading re-triggers with
//! fresher state.

use super::classify::classify;
use super::mailbox::Mailbox;
use super::textgen::TextEngine;
use crate::aggregator::Snapshot;
use crate::mqtt::{ConnectionManager, MqttError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Published to the quote topic when quote generation fails
const QUOTE_ERROR_SENTINEL: &str = "quote unavailable";

/// Display priority, defaulting to `Normal` on any ambiguity or failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Normal,
    Warning,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::Warning => "warning",
            Priority::Urgent => "urgent",
        }
    }

    /// Parse a collaborator answer; anything unrecognized is `Normal`
    pub fn parse(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "warning" => Priority::Warning,
            "urgent" => Priority::Urgent,
            _ => Priority::Normal,
        }
    }
}

/// Typed outcome of the mailbox domain
///
/// The reason for a fallback is kept explicit so tests can assert *why* a
/// sentinel was published rather than string-matching the display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailSummary {
    Summarized(String),
    /// Mailbox collaborator reports itself disabled; no fetch attempted
    Disabled,
    /// No unread mail to summarize
    Empty,
    /// Unread fetch failed; substituted with an empty result set
    FetchFailed,
    /// Messages fetched but the summary call failed
    SummarizeFailed,
}

impl EmailSummary {
    /// Fixed display sentinel per non-success variant
    pub fn display_text(&self) -> &str {
        match self {
            EmailSummary::Summarized(text) => text,
            EmailSummary::Disabled => "mailbox disabled",
            EmailSummary::Empty => "no unread mail",
            EmailSummary::FetchFailed => "mail unavailable",
            EmailSummary::SummarizeFailed => "unable to summarize",
        }
    }
}

/// Result of one pipeline run; published immediately, not retained
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub quote: String,
    pub email: EmailSummary,
    pub priority: Priority,
}

/// Thin publish seam so the orchestrator can be exercised without a broker
#[async_trait]
pub trait DisplayPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), MqttError>;
}

#[async_trait]
impl DisplayPublisher for ConnectionManager {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), MqttError> {
        self.publish_text(topic, payload).await
    }
}

/// Topics the pipeline publishes to
#[derive(Debug, Clone)]
pub struct DisplayTopics {
    pub quote: String,
    pub email: String,
    pub priority: String,
}

pub struct PipelineOrchestrator {
    text: Arc<dyn TextEngine>,
    mailbox: Arc<dyn Mailbox>,
    publisher: Arc<dyn DisplayPublisher>,
    topics: DisplayTopics,
    quote_max_chars: usize,
    unread_limit: usize,
    // Single-flight guard: at most one run at a time, retriggers dropped
    run_guard: Mutex<()>,
}

impl PipelineOrchestrator {
    pub fn new(
        text: Arc<dyn TextEngine>,
        mailbox: Arc<dyn Mailbox>,
        publisher: Arc<dyn DisplayPublisher>,
        topics: DisplayTopics,
        quote_max_chars: usize,
        unread_limit: usize,
    ) -> Self {
        Self {
            text,
            mailbox,
            publisher,
            topics,
            quote_max_chars,
            unread_limit,
            run_guard: Mutex::new(()),
        }
    }

    /// Execute one pipeline run for a trigger snapshot
    ///
    /// Returns the published result, or `None` when the trigger was dropped
    /// by the single-flight guard. Every failure inside the run falls back
    /// locally; nothing escapes.
    pub async fn run(&self, snapshot: &Snapshot) -> Option<PipelineResult> {
        let _guard = match self.run_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::debug!("Pipeline run already in flight; dropping retrigger");
                return None;
            }
        };

        let result = self.run_inner(snapshot).await;
        log::info!(
            "Pipeline run complete (priority: {})",
            result.priority.as_str()
        );
        Some(result)
    }

    async fn run_inner(&self, snapshot: &Snapshot) -> PipelineResult {
        let class = classify(snapshot);
        log::debug!("Classified snapshot as {}", class.summary());

        // Quote first: no other dependency, published immediately. A
        // generation failure falls back; a publish failure is logged and
        // must not block the mailbox domain.
        let quote = match self.text.generate_quote(snapshot, &class).await {
            Ok(text) => truncate_chars(&text, self.quote_max_chars),
            Err(e) => {
                log::warn!("Quote generation failed: {}", e);
                QUOTE_ERROR_SENTINEL.to_string()
            }
        };

        if let Err(e) = self.publisher.publish(&self.topics.quote, &quote).await {
            log::warn!("Quote publish failed: {}", e);
        }

        // Mailbox domain, isolated: always yields a defined outcome
        let (email, priority) = self.enrich_mailbox(snapshot).await;

        // Each display publish is independent; a transport failure on one
        // topic never blocks the remaining topics.
        if let Err(e) = self
            .publisher
            .publish(&self.topics.email, email.display_text())
            .await
        {
            log::warn!("Email summary publish failed: {}", e);
        }
        if let Err(e) = self
            .publisher
            .publish(&self.topics.priority, priority.as_str())
            .await
        {
            log::warn!("Priority publish failed: {}", e);
        }

        PipelineResult { quote, email, priority }
    }

    /// Mailbox domain: disabled check, bounded fetch, summary, priority.
    /// Each step independently falls back and never fails the run.
    async fn enrich_mailbox(&self, snapshot: &Snapshot) -> (EmailSummary, Priority) {
        if !self.mailbox.is_enabled() {
            log::debug!("Mailbox disabled; skipping fetch");
            return (EmailSummary::Disabled, Priority::Normal);
        }

        let messages = match self.mailbox.fetch_unread(self.unread_limit).await {
            Ok(messages) => messages,
            Err(e) => {
                log::warn!("Unread fetch failed: {}", e);
                return (EmailSummary::FetchFailed, Priority::Normal);
            }
        };

        if messages.is_empty() {
            return (EmailSummary::Empty, Priority::Normal);
        }

        let summary = match self.text.summarize_messages(&messages).await {
            Ok(text) => EmailSummary::Summarized(text),
            Err(e) => {
                log::warn!("Inbox summarization failed: {}", e);
                EmailSummary::SummarizeFailed
            }
        };

        let priority = match self.text.classify_priority(snapshot, &messages).await {
            Ok(priority) => priority,
            Err(e) => {
                log::warn!("Priority classification failed: {}", e);
                Priority::Normal
            }
        };

        (summary, priority)
    }
}

/// Truncate to a character budget on a char boundary
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_parse_defaults_to_normal() {
        assert_eq!(Priority::parse("urgent"), Priority::Urgent);
        assert_eq!(Priority::parse(" Warning \n"), Priority::Warning);
        assert_eq!(Priority::parse("NORMAL"), Priority::Normal);
        assert_eq!(Priority::parse("critical"), Priority::Normal);
        assert_eq!(Priority::parse(""), Priority::Normal);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exactly", 7), "exactly");
        assert_eq!(truncate_chars("überschüssig", 4), "über");
    }

    #[test]
    fn test_email_summary_sentinels() {
        assert_eq!(EmailSummary::Disabled.display_text(), "mailbox disabled");
        assert_eq!(EmailSummary::Empty.display_text(), "no unread mail");
        assert_eq!(EmailSummary::FetchFailed.display_text(), "mail unavailable");
        assert_eq!(
            EmailSummary::SummarizeFailed.display_text(),
            "unable to summarize"
        );
        assert_eq!(
            EmailSummary::Summarized("all quiet".to_string()).display_text(),
            "all quiet"
        );
    }
}
