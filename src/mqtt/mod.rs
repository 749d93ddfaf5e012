//! MQTT transport layer
//!
//! Owns the broker session lifecycle and topic dispatch, isolating the rest
//! of the system from transport-level events. Split into:
//!
//! - [`connection`] - session lifecycle, reconnect loop, publish gate
//! - [`handler`] - the per-topic handler seam consumed by dispatch
//!
//! Transport events flow through a single typed channel from the event-loop
//! task to the dispatch task; handler registrations live in-process and
//! survive reconnects (the manager re-issues broker subscriptions itself).

pub mod connection;
pub mod handler;

pub use connection::{ConnectionManager, MqttError};
pub use handler::TopicHandler;
