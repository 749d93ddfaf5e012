use crate::reading::{Reading, SensorKind};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Latest known value for one sensor kind
#[derive(Debug, Clone, PartialEq)]
pub struct LatestValue {
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

/// Snapshot of the required sensor values at trigger time
///
/// Handed unchanged to the enrichment pipeline. Values may be chronologically
/// stale relative to each other; the aggregator always acts on the freshest
/// known value per kind.
#[derive(Debug, Clone)]
pub struct Snapshot {
    values: HashMap<SensorKind, LatestValue>,
}

impl Snapshot {
    pub fn value(&self, kind: &SensorKind) -> Option<f64> {
        self.values.get(kind).map(|v| v.value)
    }

    pub fn observed_at(&self, kind: &SensorKind) -> Option<DateTime<Utc>> {
        self.values.get(kind).map(|v| v.observed_at)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &SensorKind> {
        self.values.keys()
    }

    /// Stable human-readable rendering, e.g. for prompt construction
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self
            .values
            .iter()
            .map(|(kind, latest)| format!("{}: {:.1}", kind, latest.value))
            .collect();
        parts.sort();
        parts.join(", ")
    }
}

/// Translates individual readings into a pipeline readiness decision
///
/// Holds the latest value per sensor kind (last-write-wins) and triggers once
/// every required kind has at least one entry. Readiness is level-triggered:
/// every ingestion of a required kind re-evaluates, so a second temperature
/// reading re-triggers against the humidity value already held.
pub struct SensorAggregator {
    latest_by_kind: HashMap<SensorKind, LatestValue>,
    required_kinds: Vec<SensorKind>,
}

impl SensorAggregator {
    pub fn new(required_kinds: Vec<SensorKind>) -> Self {
        Self {
            latest_by_kind: HashMap::new(),
            required_kinds,
        }
    }

    /// Ingest one reading; returns the required-value snapshot when ready
    ///
    /// The update is unconditional even when no trigger fires. Values are
    /// never cleared after a trigger.
    pub fn ingest(&mut self, reading: &Reading) -> Option<Snapshot> {
        self.latest_by_kind.insert(
            reading.kind.clone(),
            LatestValue {
                value: reading.value,
                observed_at: reading.observed_at,
            },
        );

        if !self.is_ready() {
            return None;
        }

        let values = self
            .required_kinds
            .iter()
            .filter_map(|kind| {
                self.latest_by_kind
                    .get(kind)
                    .map(|latest| (kind.clone(), latest.clone()))
            })
            .collect();

        Some(Snapshot { values })
    }

    pub fn latest(&self, kind: &SensorKind) -> Option<&LatestValue> {
        self.latest_by_kind.get(kind)
    }

    fn is_ready(&self) -> bool {
        self.required_kinds
            .iter()
            .all(|kind| self.latest_by_kind.contains_key(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_reading(kind: SensorKind, value: f64, ts_secs: i64) -> Reading {
        Reading {
            kind,
            value,
            observed_at: Utc.timestamp_opt(ts_secs, 0).unwrap(),
            raw: serde_json::Map::new(),
        }
    }

    fn make_aggregator() -> SensorAggregator {
        SensorAggregator::new(vec![SensorKind::Temperature, SensorKind::Humidity])
    }

    #[test]
    fn test_no_trigger_until_required_set_complete() {
        let mut agg = make_aggregator();

        assert!(agg.ingest(&make_reading(SensorKind::Temperature, 22.5, 100)).is_none());
        assert!(agg.ingest(&make_reading(SensorKind::Temperature, 23.0, 101)).is_none());

        let snapshot = agg.ingest(&make_reading(SensorKind::Humidity, 45.2, 102)).unwrap();
        assert_eq!(snapshot.value(&SensorKind::Temperature), Some(23.0));
        assert_eq!(snapshot.value(&SensorKind::Humidity), Some(45.2));
    }

    #[test]
    fn test_last_write_wins_per_kind() {
        let mut agg = make_aggregator();

        let _ = agg.ingest(&make_reading(SensorKind::Temperature, 20.0, 100));
        let _ = agg.ingest(&make_reading(SensorKind::Humidity, 40.0, 101));
        let _ = agg.ingest(&make_reading(SensorKind::Temperature, 25.0, 102));

        assert_eq!(agg.latest(&SensorKind::Temperature).unwrap().value, 25.0);
        assert_eq!(agg.latest(&SensorKind::Humidity).unwrap().value, 40.0);
    }

    #[test]
    fn test_level_triggered_retrigger_with_stale_partner() {
        let mut agg = make_aggregator();

        let _ = agg.ingest(&make_reading(SensorKind::Temperature, 22.5, 100));
        let _ = agg.ingest(&make_reading(SensorKind::Humidity, 45.2, 101));

        // A much later temperature reading still triggers against the
        // humidity value held since ts=101
        let snapshot = agg
            .ingest(&make_reading(SensorKind::Temperature, 30.0, 9000))
            .unwrap();
        assert_eq!(snapshot.value(&SensorKind::Temperature), Some(30.0));
        assert_eq!(snapshot.value(&SensorKind::Humidity), Some(45.2));
        assert_eq!(
            snapshot.observed_at(&SensorKind::Humidity).unwrap().timestamp(),
            101
        );
    }

    #[test]
    fn test_non_required_kind_never_triggers_alone() {
        let mut agg = make_aggregator();

        let _ = agg.ingest(&make_reading(SensorKind::Temperature, 22.0, 100));
        let result = agg.ingest(&make_reading(SensorKind::Other("co2".into()), 600.0, 101));
        assert!(result.is_none());

        // But once the set is complete, the snapshot holds required kinds only
        let snapshot = agg.ingest(&make_reading(SensorKind::Humidity, 50.0, 102)).unwrap();
        assert!(snapshot.value(&SensorKind::Other("co2".into())).is_none());
    }

    #[test]
    fn test_configurable_required_set() {
        let mut agg = SensorAggregator::new(vec![
            SensorKind::Temperature,
            SensorKind::Humidity,
            SensorKind::Other("co2".into()),
        ]);

        let _ = agg.ingest(&make_reading(SensorKind::Temperature, 22.0, 100));
        assert!(agg.ingest(&make_reading(SensorKind::Humidity, 50.0, 101)).is_none());

        let snapshot = agg
            .ingest(&make_reading(SensorKind::Other("co2".into()), 600.0, 102))
            .unwrap();
        assert_eq!(snapshot.value(&SensorKind::Other("co2".into())), Some(600.0));
    }
}
