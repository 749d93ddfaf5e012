//! Enrichment pipeline
//!
//! Runs once per aggregator trigger: deterministic environmental
//! classification, quote generation, inbox summarization, and priority
//! classification, each in its own failure domain so one failing
//! collaborator never blocks the others. Every display topic receives
//! either a real value or a fixed fallback sentinel per run.
//!
//! ## Module Organization
//!
//! - `classify` - deterministic comfort banding from the sensor snapshot
//! - `textgen` - text-generation collaborator trait + HTTP implementation
//! - `mailbox` - mailbox collaborator trait + HTTP implementation
//! - `orchestrator` - the fan-out with failure isolation and fallbacks
//! - `ingestion` - topic handler bridging dispatch into store and aggregator

pub mod classify;
pub mod ingestion;
pub mod mailbox;
pub mod orchestrator;
pub mod textgen;

pub use classify::{classify, Classification};
pub use ingestion::SensorIngestor;
pub use mailbox::{HttpMailbox, MailMessage, Mailbox};
pub use orchestrator::{
    DisplayPublisher, DisplayTopics, EmailSummary, PipelineOrchestrator, PipelineResult, Priority,
};
pub use textgen::{HttpTextEngine, TextEngine};

/// Failure of an enrichment collaborator call
///
/// Always recovered locally with a fixed fallback value at the orchestrator
/// boundary; never propagated out of a pipeline run.
#[derive(Debug)]
pub enum CollaboratorError {
    Http(String),
    /// Response arrived but did not carry a usable value
    Malformed(String),
}

impl std::fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollaboratorError::Http(msg) => write!(f, "collaborator request failed: {}", msg),
            CollaboratorError::Malformed(msg) => write!(f, "malformed collaborator response: {}", msg),
        }
    }
}

impl std::error::Error for CollaboratorError {}

impl From<reqwest::Error> for CollaboratorError {
    fn from(e: reqwest::Error) -> Self {
        CollaboratorError::Http(e.to_string())
    }
}
