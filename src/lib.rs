//! sensorflow - environmental sensor enrichment over MQTT
//!
//! Ingests periodic sensor readings from broker topics, keeps the latest
//! value per sensor kind, and once the required reading set is complete runs
//! an enrichment pipeline (quote generation, inbox summary, priority
//! classification) whose results are re-published for a display client.

pub mod aggregator;
pub mod config;
pub mod mqtt;
pub mod pipeline;
pub mod reading;
pub mod store;

pub use aggregator::{SensorAggregator, Snapshot};
pub use config::{Config, ConfigError};
pub use reading::{Reading, SensorKind};
pub use store::BoundedReadingStore;
