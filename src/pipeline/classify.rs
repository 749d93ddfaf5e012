//! Deterministic environmental classification
//!
//! Pure compute, no I/O. The bands feed the quote prompt so the generated
//! text can reference the room feel, and give tests a stable fixture.

use crate::aggregator::Snapshot;
use crate::reading::SensorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureBand {
    Cold,
    Cool,
    Comfortable,
    Warm,
    Hot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HumidityBand {
    Dry,
    Comfortable,
    Humid,
}

/// Comfort classification of the current required-value snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub temperature: Option<TemperatureBand>,
    pub humidity: Option<HumidityBand>,
}

impl Classification {
    /// Short human-readable form used in prompt construction
    pub fn summary(&self) -> String {
        let temp = match self.temperature {
            Some(TemperatureBand::Cold) => "cold",
            Some(TemperatureBand::Cool) => "cool",
            Some(TemperatureBand::Comfortable) => "comfortable",
            Some(TemperatureBand::Warm) => "warm",
            Some(TemperatureBand::Hot) => "hot",
            None => "unknown temperature",
        };
        let humidity = match self.humidity {
            Some(HumidityBand::Dry) => "dry air",
            Some(HumidityBand::Comfortable) => "pleasant air",
            Some(HumidityBand::Humid) => "humid air",
            None => "unknown humidity",
        };
        format!("{}, {}", temp, humidity)
    }
}

/// Classify a snapshot into comfort bands
pub fn classify(snapshot: &Snapshot) -> Classification {
    let temperature = snapshot
        .value(&SensorKind::Temperature)
        .map(|celsius| match celsius {
            c if c < 10.0 => TemperatureBand::Cold,
            c if c < 18.0 => TemperatureBand::Cool,
            c if c < 26.0 => TemperatureBand::Comfortable,
            c if c < 32.0 => TemperatureBand::Warm,
            _ => TemperatureBand::Hot,
        });

    let humidity = snapshot
        .value(&SensorKind::Humidity)
        .map(|percent| match percent {
            h if h < 30.0 => HumidityBand::Dry,
            h if h <= 60.0 => HumidityBand::Comfortable,
            _ => HumidityBand::Humid,
        });

    Classification { temperature, humidity }
}
