use crate::reading::SensorKind;
use std::env;

/// MQTT topic layout (all overridable via environment)
#[derive(Debug, Clone)]
pub struct Topics {
    pub temperature: String,
    pub humidity: String,
    pub quote: String,
    pub email: String,
    pub priority: String,
}

/// Runtime configuration loaded from environment variables
///
/// Required: MQTT_URL, TEXTGEN_URL, TEXTGEN_API_KEY.
/// The mailbox collaborator is enabled only when both MAILBOX_URL and
/// MAILBOX_TOKEN are present.
#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt_url: String,
    pub mqtt_client_id: String,
    pub topics: Topics,
    /// Sensor kinds that must all have a value before a pipeline run triggers
    pub required_kinds: Vec<SensorKind>,
    pub store_path: String,
    pub store_cap: usize,
    /// Display-safe character budget for the published quote
    pub quote_max_chars: usize,
    /// Maximum unread messages fetched per pipeline run
    pub unread_limit: usize,
    pub textgen_url: String,
    pub textgen_api_key: String,
    pub textgen_model: String,
    pub mailbox_url: Option<String>,
    pub mailbox_token: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVariable(name.to_string()))
}

fn defaulted(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mqtt_url = required("MQTT_URL")?;

        // No TLS transport is configured on the broker client, so an
        // mqtts:// URL is rejected rather than silently downgraded
        if !mqtt_url.starts_with("mqtt://") {
            return Err(ConfigError::InvalidValue(
                "MQTT_URL must start with mqtt:// (TLS broker sessions are not supported)"
                    .to_string(),
            ));
        }

        let required_kinds: Vec<SensorKind> = defaulted("REQUIRED_KINDS", "temperature,humidity")
            .split(',')
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(SensorKind::from)
            .collect();

        if required_kinds.is_empty() {
            return Err(ConfigError::InvalidValue(
                "REQUIRED_KINDS must name at least one sensor kind".to_string(),
            ));
        }

        let store_cap = defaulted("STORE_CAP", "1000")
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue("STORE_CAP must be a positive integer".to_string()))?;
        if store_cap == 0 {
            return Err(ConfigError::InvalidValue(
                "STORE_CAP must be a positive integer".to_string(),
            ));
        }

        let quote_max_chars = defaulted("QUOTE_MAX_CHARS", "200")
            .parse::<usize>()
            .unwrap_or(200);

        let unread_limit = defaulted("UNREAD_LIMIT", "5").parse::<usize>().unwrap_or(5);

        Ok(Self {
            mqtt_url,
            mqtt_client_id: defaulted("MQTT_CLIENT_ID", "sensorflow"),
            topics: Topics {
                temperature: defaulted("TOPIC_TEMPERATURE", "sensor/temperature"),
                humidity: defaulted("TOPIC_HUMIDITY", "sensor/humidity"),
                quote: defaulted("TOPIC_QUOTE", "display/quote"),
                email: defaulted("TOPIC_EMAIL", "display/email"),
                priority: defaulted("TOPIC_PRIORITY", "display/priority"),
            },
            required_kinds,
            store_path: defaulted("STORE_PATH", "readings.json"),
            store_cap,
            quote_max_chars,
            unread_limit,
            textgen_url: required("TEXTGEN_URL")?,
            textgen_api_key: required("TEXTGEN_API_KEY")?,
            textgen_model: defaulted("TEXTGEN_MODEL", "gpt-4o-mini"),
            mailbox_url: env::var("MAILBOX_URL").ok(),
            mailbox_token: env::var("MAILBOX_TOKEN").ok(),
        })
    }

    /// Parse MQTT_URL into (host, port) for the broker client
    ///
    /// Only plain `mqtt://` is accepted; the client speaks plain TCP.
    pub fn mqtt_host_port(&self) -> Result<(String, u16), ConfigError> {
        let rest = match self.mqtt_url.strip_prefix("mqtt://") {
            Some(rest) => rest,
            None => {
                return Err(ConfigError::InvalidValue(format!(
                    "unsupported MQTT scheme in {}",
                    self.mqtt_url
                )))
            }
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    ConfigError::InvalidValue(format!("invalid MQTT port in {}", self.mqtt_url))
                })?;
                (host.to_string(), port)
            }
            None => (rest.to_string(), 1883),
        };

        if host.is_empty() {
            return Err(ConfigError::InvalidValue(format!(
                "missing MQTT host in {}",
                self.mqtt_url
            )));
        }

        Ok((host, port))
    }
}
