//! Sensor ingestion - the topic handler bridging dispatch into the core
//!
//! One handler instance serves every subscribed sensor topic: it parses the
//! payload, appends the reading to the bounded store, feeds the aggregator,
//! and spawns a pipeline run when the required reading set is complete.

use crate::aggregator::SensorAggregator;
use crate::mqtt::TopicHandler;
use crate::pipeline::orchestrator::PipelineOrchestrator;
use crate::reading::{parse_payload, SensorKind};
use crate::store::BoundedReadingStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct SensorIngestor {
    /// Exact subscribe topic → sensor kind carried on it
    topic_kinds: HashMap<String, SensorKind>,
    store: Arc<Mutex<BoundedReadingStore>>,
    aggregator: Arc<Mutex<SensorAggregator>>,
    orchestrator: Arc<PipelineOrchestrator>,
}

impl SensorIngestor {
    pub fn new(
        topic_kinds: HashMap<String, SensorKind>,
        store: Arc<Mutex<BoundedReadingStore>>,
        aggregator: Arc<Mutex<SensorAggregator>>,
        orchestrator: Arc<PipelineOrchestrator>,
    ) -> Self {
        Self {
            topic_kinds,
            store,
            aggregator,
            orchestrator,
        }
    }
}

#[async_trait]
impl TopicHandler for SensorIngestor {
    async fn handle(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let kind = self
            .topic_kinds
            .get(topic)
            .ok_or_else(|| format!("no sensor kind mapped for topic {}", topic))?;

        let reading = parse_payload(kind.clone(), payload)?;
        log::debug!(
            "Reading on {}: {} = {}",
            topic,
            reading.kind,
            reading.value
        );

        // Durability failure is logged but never blocks aggregation
        if let Err(e) = self.store.lock().await.append(reading.clone()) {
            log::warn!("Reading not durably stored: {}", e);
        }

        let trigger = self.aggregator.lock().await.ingest(&reading);

        if let Some(snapshot) = trigger {
            let orchestrator = self.orchestrator.clone();
            tokio::spawn(async move {
                orchestrator.run(&snapshot).await;
            });
        }

        Ok(())
    }
}
