//! Production runtime
//!
//! Wires the full flow: MQTT connection and dispatch, the bounded reading
//! store (restored from its snapshot), the sensor aggregator, and the
//! enrichment pipeline with its HTTP collaborators. Runs until SIGINT,
//! then disconnects gracefully.
//!
//! Usage:
//!   cargo run --release --bin sensorflow_runtime
//!
//! Required environment variables:
//!   MQTT_URL, TEXTGEN_URL, TEXTGEN_API_KEY
//!
//! The mailbox collaborator activates only when MAILBOX_URL and
//! MAILBOX_TOKEN are both set.

use dotenv::dotenv;
use log::{error, info, warn};
use sensorflow::aggregator::SensorAggregator;
use sensorflow::config::Config;
use sensorflow::mqtt::ConnectionManager;
use sensorflow::pipeline::{
    DisplayPublisher, DisplayTopics, HttpMailbox, HttpTextEngine, PipelineOrchestrator,
    SensorIngestor,
};
use sensorflow::reading::SensorKind;
use sensorflow::store::BoundedReadingStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    // Configuration failures are the only non-transport fatal startup path
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let (host, port) = match config.mqtt_host_port() {
        Ok(parsed) => parsed,
        Err(e) => {
            error!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("🚀 Starting sensorflow");
    info!("   ├─ Broker: {}:{}", host, port);
    info!(
        "   ├─ Subscribe: {} / {}",
        config.topics.temperature, config.topics.humidity
    );
    info!(
        "   ├─ Publish: {} / {} / {}",
        config.topics.quote, config.topics.email, config.topics.priority
    );
    info!(
        "   ├─ Store: {} (cap {})",
        config.store_path, config.store_cap
    );
    info!(
        "   └─ Mailbox: {}",
        if config.mailbox_url.is_some() && config.mailbox_token.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );

    // Restore the reading log; a broken snapshot starts the store empty
    let store = match BoundedReadingStore::load(&config.store_path, config.store_cap) {
        Ok(store) => store,
        Err(e) => {
            warn!("Failed to load reading snapshot, starting empty: {}", e);
            BoundedReadingStore::new(&config.store_path, config.store_cap)
        }
    };
    let store = Arc::new(Mutex::new(store));

    let aggregator = Arc::new(Mutex::new(SensorAggregator::new(
        config.required_kinds.clone(),
    )));

    let manager = Arc::new(ConnectionManager::new(&config.mqtt_client_id, &host, port));

    // The first transport error during initial connect aborts the process;
    // everything after this point is retried by the reconnect loop
    manager.connect().await?;

    let text_engine = Arc::new(HttpTextEngine::new(
        &config.textgen_url,
        &config.textgen_api_key,
        &config.textgen_model,
    )?);
    let mailbox = Arc::new(HttpMailbox::new(
        config.mailbox_url.clone(),
        config.mailbox_token.clone(),
    )?);

    let publisher: Arc<dyn DisplayPublisher> = manager.clone();
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        text_engine,
        mailbox,
        publisher,
        DisplayTopics {
            quote: config.topics.quote.clone(),
            email: config.topics.email.clone(),
            priority: config.topics.priority.clone(),
        },
        config.quote_max_chars,
        config.unread_limit,
    ));

    let mut topic_kinds = HashMap::new();
    topic_kinds.insert(config.topics.temperature.clone(), SensorKind::Temperature);
    topic_kinds.insert(config.topics.humidity.clone(), SensorKind::Humidity);

    let ingestor = Arc::new(SensorIngestor::new(
        topic_kinds,
        store,
        aggregator,
        orchestrator,
    ));

    manager
        .subscribe(&config.topics.temperature, ingestor.clone())
        .await?;
    manager
        .subscribe(&config.topics.humidity, ingestor)
        .await?;

    info!("✅ sensorflow running; Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received; disconnecting");
    manager.disconnect().await?;

    info!("✅ Graceful shutdown complete");
    Ok(())
}
