use async_trait::async_trait;

/// Per-topic message handler invoked by the dispatch loop
///
/// One handler is registered per exact topic string; a later registration
/// for the same topic replaces the earlier one. A returned error is logged
/// per-message and never tears down dispatch for other topics.
#[async_trait]
pub trait TopicHandler: Send + Sync {
    async fn handle(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
