//! Broker session lifecycle and topic dispatch
//!
//! State machine: Disconnected → Connecting → Connected ⇄ Offline →
//! Disconnected. `Offline` is degraded but not terminal: the event-loop task
//! keeps polling on a fixed interval until the broker accepts the session
//! again, and the dispatch task then re-issues subscriptions for every
//! registered topic so callers never re-subscribe.

use crate::mqtt::handler::TopicHandler;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};

/// Fixed delay between reconnect attempts after a transport error
const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum MqttError {
    /// Publish or subscribe attempted while the session is down
    NotConnected,
    Connect(String),
    Subscribe(String),
    Publish(String),
}

impl std::fmt::Display for MqttError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MqttError::NotConnected => write!(f, "not connected to broker"),
            MqttError::Connect(msg) => write!(f, "broker connection error: {}", msg),
            MqttError::Subscribe(msg) => write!(f, "subscribe error: {}", msg),
            MqttError::Publish(msg) => write!(f, "publish error: {}", msg),
        }
    }
}

impl std::error::Error for MqttError {}

/// Typed transport events, pushed onto one consumption point by the
/// event-loop task and drained by the dispatch task
#[derive(Debug)]
enum TransportEvent {
    Connected,
    Offline,
    Message { topic: String, payload: Vec<u8> },
}

type HandlerMap = Arc<RwLock<HashMap<String, Arc<dyn TopicHandler>>>>;

/// Owns the MQTT session: connect/reconnect, publish gate, topic dispatch
pub struct ConnectionManager {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    shutting_down: Arc<AtomicBool>,
    handlers: HandlerMap,
    // Taken by the first connect() call; None afterwards
    event_loop: Mutex<Option<EventLoop>>,
}

impl ConnectionManager {
    pub fn new(client_id: &str, host: &str, port: u16) -> Self {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, event_loop) = AsyncClient::new(options, 64);

        Self {
            client,
            connected: Arc::new(AtomicBool::new(false)),
            shutting_down: Arc::new(AtomicBool::new(false)),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            event_loop: Mutex::new(Some(event_loop)),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Establish the broker session
    ///
    /// Resolves once the initial handshake succeeds and rejects on the first
    /// pre-connection error only; every later transport error is logged and
    /// retried by the reconnect loop without surfacing to callers.
    pub async fn connect(&self) -> Result<(), MqttError> {
        let event_loop = match self.event_loop.lock().await.take() {
            Some(el) => el,
            None => {
                log::debug!("connect() called twice; session already running");
                return Ok(());
            }
        };

        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), MqttError>>();
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(256);

        self.spawn_event_loop(event_loop, event_tx, ready_tx);
        self.spawn_dispatch(event_rx);

        ready_rx
            .await
            .map_err(|_| MqttError::Connect("event loop terminated before handshake".to_string()))?
    }

    /// Register a handler and subscribe on the broker
    ///
    /// Fails fast when offline; no implicit queuing. A registration for an
    /// already-registered topic overwrites the previous handler.
    pub async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn TopicHandler>,
    ) -> Result<(), MqttError> {
        if !self.is_connected() {
            return Err(MqttError::NotConnected);
        }

        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| MqttError::Subscribe(e.to_string()))?;

        self.handlers
            .write()
            .await
            .insert(topic.to_string(), handler);

        log::info!("Subscribed to {}", topic);
        Ok(())
    }

    /// Publish a string payload as-is
    pub async fn publish_text(&self, topic: &str, text: &str) -> Result<(), MqttError> {
        if !self.is_connected() {
            return Err(MqttError::NotConnected);
        }

        self.client
            .publish(topic, QoS::AtLeastOnce, false, text)
            .await
            .map_err(|e| MqttError::Publish(e.to_string()))
    }

    /// Serialize a non-string payload to canonical JSON and publish it
    pub async fn publish_value<T: Serialize>(
        &self,
        topic: &str,
        value: &T,
    ) -> Result<(), MqttError> {
        let json = serde_json::to_string(value).map_err(|e| MqttError::Publish(e.to_string()))?;
        self.publish_text(topic, &json).await
    }

    /// Graceful shutdown; idempotent
    ///
    /// Stops the session task even while the broker is unreachable, so an
    /// Offline session still reaches Disconnected. The fast path applies
    /// only when `connect()` was never called.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        if self.event_loop.lock().await.is_some() {
            return Ok(());
        }

        self.shutting_down.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);

        // The request channel is gone once the session task has stopped;
        // not a failure on this path
        if let Err(e) = self.client.disconnect().await {
            log::debug!("Disconnect request not delivered: {}", e);
        }

        log::info!("Disconnected from broker");
        Ok(())
    }

    fn spawn_event_loop(
        &self,
        mut event_loop: EventLoop,
        event_tx: mpsc::Sender<TransportEvent>,
        ready_tx: oneshot::Sender<Result<(), MqttError>>,
    ) {
        let connected = self.connected.clone();
        let shutting_down = self.shutting_down.clone();

        tokio::spawn(async move {
            let mut ready = Some(ready_tx);

            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        let was_offline = connected.swap(true, Ordering::SeqCst);
                        if let Some(tx) = ready.take() {
                            let _ = tx.send(Ok(()));
                        }

                        if was_offline {
                            log::info!("Broker session re-established");
                        }

                        let _ = event_tx.send(TransportEvent::Connected).await;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let _ = event_tx
                            .send(TransportEvent::Message {
                                topic: publish.topic.clone(),
                                payload: publish.payload.to_vec(),
                            })
                            .await;
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        connected.store(false, Ordering::SeqCst);
                        let _ = event_tx.send(TransportEvent::Offline).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if shutting_down.load(Ordering::SeqCst) {
                            log::debug!("Event loop stopped after disconnect");
                            break;
                        }

                        // First error before the handshake is fatal to connect()
                        if let Some(tx) = ready.take() {
                            let _ = tx.send(Err(MqttError::Connect(e.to_string())));
                            break;
                        }

                        if connected.swap(false, Ordering::SeqCst) {
                            let _ = event_tx.send(TransportEvent::Offline).await;
                        }

                        log::warn!(
                            "MQTT transport error: {}; retrying in {}s",
                            e,
                            RECONNECT_INTERVAL.as_secs()
                        );
                        tokio::time::sleep(RECONNECT_INTERVAL).await;
                    }
                }
            }
        });
    }

    fn spawn_dispatch(&self, mut event_rx: mpsc::Receiver<TransportEvent>) {
        let client = self.client.clone();
        let handlers = self.handlers.clone();

        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                match event {
                    TransportEvent::Connected => {
                        log::info!("📡 Broker session established");

                        // Re-issue broker subscriptions for every registered
                        // topic; in-process registrations survive reconnects
                        let topics: Vec<String> =
                            handlers.read().await.keys().cloned().collect();
                        for topic in topics {
                            if let Err(e) = client.subscribe(&topic, QoS::AtLeastOnce).await {
                                log::warn!("Re-subscribe failed for {}: {}", topic, e);
                            }
                        }
                    }
                    TransportEvent::Offline => {
                        log::warn!("Broker offline; reconnect loop engaged");
                    }
                    TransportEvent::Message { topic, payload } => {
                        let handler = handlers.read().await.get(&topic).cloned();

                        match handler {
                            Some(handler) => {
                                // A handler failure is contained per-message
                                if let Err(e) = handler.handle(&topic, &payload).await {
                                    log::error!("Handler error on {}: {}", topic, e);
                                }
                            }
                            None => {
                                log::debug!("Dropping message on unmatched topic {}", topic);
                            }
                        }
                    }
                }
            }

            log::debug!("Dispatch loop stopped");
        });
    }
}
