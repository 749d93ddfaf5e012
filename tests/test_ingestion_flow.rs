//! Integration tests for the dispatch → store → aggregator → pipeline flow
//!
//! Drives the topic handler directly with raw payloads, the way the MQTT
//! dispatch loop would, and verifies storage, triggering, and the published
//! display values end to end with mock collaborators.

use async_trait::async_trait;
use sensorflow::aggregator::{SensorAggregator, Snapshot};
use sensorflow::mqtt::{MqttError, TopicHandler};
use sensorflow::pipeline::classify::Classification;
use sensorflow::pipeline::{
    CollaboratorError, DisplayPublisher, DisplayTopics, MailMessage, Mailbox,
    PipelineOrchestrator, Priority, SensorIngestor, TextEngine,
};
use sensorflow::reading::SensorKind;
use sensorflow::store::BoundedReadingStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

struct EchoTextEngine;

#[async_trait]
impl TextEngine for EchoTextEngine {
    async fn generate_quote(
        &self,
        snapshot: &Snapshot,
        _class: &Classification,
    ) -> Result<String, CollaboratorError> {
        Ok(format!("conditions: {}", snapshot.describe()))
    }

    async fn summarize_messages(
        &self,
        _messages: &[MailMessage],
    ) -> Result<String, CollaboratorError> {
        Ok("summary".to_string())
    }

    async fn classify_priority(
        &self,
        _snapshot: &Snapshot,
        _messages: &[MailMessage],
    ) -> Result<Priority, CollaboratorError> {
        Ok(Priority::Normal)
    }
}

struct DisabledMailbox;

#[async_trait]
impl Mailbox for DisabledMailbox {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn fetch_unread(&self, _max: usize) -> Result<Vec<MailMessage>, CollaboratorError> {
        Err(CollaboratorError::Http("disabled".to_string()))
    }
}

#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<(String, String)>>,
}

impl RecordingPublisher {
    async fn count(&self) -> usize {
        self.published.lock().await.len()
    }

    async fn on_topic(&self, topic: &str) -> Vec<String> {
        self.published
            .lock()
            .await
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

#[async_trait]
impl DisplayPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), MqttError> {
        self.published
            .lock()
            .await
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

struct Fixture {
    ingestor: SensorIngestor,
    store: Arc<Mutex<BoundedReadingStore>>,
    publisher: Arc<RecordingPublisher>,
    _dir: tempfile::TempDir,
}

fn make_fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Mutex::new(BoundedReadingStore::new(
        dir.path().join("readings.json"),
        1000,
    )));
    let aggregator = Arc::new(Mutex::new(SensorAggregator::new(vec![
        SensorKind::Temperature,
        SensorKind::Humidity,
    ])));

    let publisher = Arc::new(RecordingPublisher::default());
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        Arc::new(EchoTextEngine),
        Arc::new(DisabledMailbox),
        publisher.clone(),
        DisplayTopics {
            quote: "display/quote".to_string(),
            email: "display/email".to_string(),
            priority: "display/priority".to_string(),
        },
        200,
        5,
    ));

    let mut topic_kinds = HashMap::new();
    topic_kinds.insert("sensor/temperature".to_string(), SensorKind::Temperature);
    topic_kinds.insert("sensor/humidity".to_string(), SensorKind::Humidity);

    Fixture {
        ingestor: SensorIngestor::new(topic_kinds, store.clone(), aggregator, orchestrator),
        store,
        publisher,
        _dir: dir,
    }
}

/// Wait for the spawned pipeline run to finish publishing
async fn wait_for_publishes(publisher: &RecordingPublisher, expected: usize) {
    for _ in 0..100 {
        if publisher.count().await >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {} publishes, saw {}",
        expected,
        publisher.count().await
    );
}

#[tokio::test]
async fn test_complete_reading_set_triggers_exactly_one_run() {
    let fixture = make_fixture();

    fixture
        .ingestor
        .handle("sensor/temperature", b"22.5")
        .await
        .unwrap();
    // First reading alone must not trigger
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(fixture.publisher.count().await, 0);

    fixture
        .ingestor
        .handle("sensor/humidity", b"45.2")
        .await
        .unwrap();
    wait_for_publishes(&fixture.publisher, 3).await;

    let quotes = fixture.publisher.on_topic("display/quote").await;
    assert_eq!(quotes.len(), 1);
    assert!(quotes[0].contains("temperature: 22.5"));
    assert!(quotes[0].contains("humidity: 45.2"));
    assert_eq!(
        fixture.publisher.on_topic("display/email").await,
        vec!["mailbox disabled"]
    );
    assert_eq!(
        fixture.publisher.on_topic("display/priority").await,
        vec!["normal"]
    );
}

#[tokio::test]
async fn test_readings_are_appended_to_store() {
    let fixture = make_fixture();

    fixture
        .ingestor
        .handle("sensor/temperature", b"21.0")
        .await
        .unwrap();
    fixture
        .ingestor
        .handle(
            "sensor/humidity",
            br#"{"value": 50.5, "sensor_id": "dht22-1"}"#,
        )
        .await
        .unwrap();

    let store = fixture.store.lock().await;
    assert_eq!(store.len(), 2);

    let humidity = store.latest_by_kind(&SensorKind::Humidity).unwrap();
    assert_eq!(humidity.value, 50.5);
    assert_eq!(humidity.raw.get("sensor_id").unwrap(), "dht22-1");
}

#[tokio::test]
async fn test_unparseable_payload_is_an_error_and_does_not_trigger() {
    let fixture = make_fixture();

    fixture
        .ingestor
        .handle("sensor/temperature", b"22.0")
        .await
        .unwrap();

    let result = fixture.ingestor.handle("sensor/humidity", b"not a number").await;
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(fixture.publisher.count().await, 0);
    // The bad payload never reached the store
    assert_eq!(fixture.store.lock().await.len(), 1);
}

#[tokio::test]
async fn test_unmapped_topic_is_an_error() {
    let fixture = make_fixture();
    let result = fixture.ingestor.handle("sensor/pressure", b"1013").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_level_triggered_retrigger_on_fresh_temperature() {
    let fixture = make_fixture();

    fixture
        .ingestor
        .handle("sensor/temperature", b"22.5")
        .await
        .unwrap();
    fixture
        .ingestor
        .handle("sensor/humidity", b"45.2")
        .await
        .unwrap();
    wait_for_publishes(&fixture.publisher, 3).await;

    // A fresh temperature reading re-triggers against the held humidity
    fixture
        .ingestor
        .handle("sensor/temperature", b"30.0")
        .await
        .unwrap();
    wait_for_publishes(&fixture.publisher, 6).await;

    let quotes = fixture.publisher.on_topic("display/quote").await;
    assert_eq!(quotes.len(), 2);
    assert!(quotes[1].contains("temperature: 30.0"));
    assert!(quotes[1].contains("humidity: 45.2"));
}
