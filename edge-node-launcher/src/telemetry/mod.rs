//! Telemetry history loading for the edge node
//!
//! The node keeps a rolling history file in the shared volume:
//! - `timestamps`: ISO-8601 sample times, oldest first
//! - one array per metric (`cpu_load`, `occupied_memory`, `gpu_load`, ...)
//! - scalar status fields (`epoch`, `epoch_avail`, `uptime`, `version`)
//!
//! The document is decoded once into a [`TelemetrySnapshot`] and the
//! [`HistoryStore`] decides whether it differs from what was last accepted.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound on the number of samples kept in memory
pub const DEFAULT_MAX_HISTORY_QUEUE: usize = 1000;

/// Placeholder for numeric scalar fields missing from the document
pub const UNKNOWN_NUMBER: i64 = -1;

/// Placeholder for a missing uptime
pub const UNKNOWN_UPTIME: &str = "-1";

/// Why a history document yielded no data
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history file not found")]
    Missing,
    #[error("history file is not a valid history document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("history document has no timestamps")]
    NoTimestamps,
}

/// Node status fields carried next to the series
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarFields {
    pub epoch: i64,
    pub epoch_avail: f64,
    pub uptime: String,
    pub version: String,
}

impl Default for ScalarFields {
    fn default() -> Self {
        Self {
            epoch: UNKNOWN_NUMBER,
            epoch_avail: UNKNOWN_NUMBER as f64,
            uptime: UNKNOWN_UPTIME.to_string(),
            version: String::new(),
        }
    }
}

/// Decoded telemetry history, every series aligned with `timestamps`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub timestamps: Vec<String>,
    pub series: BTreeMap<String, Vec<Option<f64>>>,
    pub scalars: ScalarFields,
}

/// Wire shape of the history file
#[derive(Debug, Deserialize)]
struct RawHistory {
    timestamps: Option<Vec<String>>,
    epoch: Option<Value>,
    epoch_avail: Option<Value>,
    uptime: Option<Value>,
    version: Option<Value>,
    #[serde(flatten)]
    series: BTreeMap<String, Value>,
}

impl TelemetrySnapshot {
    /// Decode and normalize a raw history document
    pub fn decode(raw: &[u8]) -> Result<Self, HistoryError> {
        let raw: RawHistory = serde_json::from_slice(raw)?;
        let timestamps = raw.timestamps.ok_or(HistoryError::NoTimestamps)?;

        let scalars = ScalarFields {
            epoch: raw.epoch.as_ref().and_then(as_integer).unwrap_or(UNKNOWN_NUMBER),
            epoch_avail: raw
                .epoch_avail
                .as_ref()
                .and_then(Value::as_f64)
                .unwrap_or(UNKNOWN_NUMBER as f64),
            uptime: raw
                .uptime
                .as_ref()
                .and_then(as_text)
                .unwrap_or_else(|| UNKNOWN_UPTIME.to_string()),
            version: raw.version.as_ref().and_then(as_text).unwrap_or_default(),
        };

        let len = timestamps.len();
        let mut series = BTreeMap::new();
        for (metric, value) in raw.series {
            match value {
                Value::Array(items) => {
                    let values = items.iter().map(Value::as_f64).collect();
                    series.insert(metric, align(values, len));
                }
                other => debug!("Ignoring non-series field `{}` ({})", metric, kind_of(&other)),
            }
        }

        Ok(TelemetrySnapshot {
            timestamps,
            series,
            scalars,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn series(&self, metric: &str) -> Option<&[Option<f64>]> {
        self.series.get(metric).map(Vec::as_slice)
    }

    /// Keep only the newest `max_len` samples, in lock-step across series
    pub fn truncate_to(&mut self, max_len: usize) {
        if self.timestamps.len() <= max_len {
            return;
        }
        let cut = self.timestamps.len() - max_len;
        self.timestamps.drain(..cut);
        for values in self.series.values_mut() {
            values.drain(..cut);
        }
    }

    /// First and last timestamp, as written by the node
    pub fn time_span(&self) -> Option<(&str, &str)> {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) => Some((first.as_str(), last.as_str())),
            _ => None,
        }
    }
}

/// Force a series to `len` entries: newest values win, missing leading ones are absent
fn align(mut values: Vec<Option<f64>>, len: usize) -> Vec<Option<f64>> {
    if values.len() > len {
        values.drain(..values.len() - len);
        values
    } else if values.len() < len {
        let mut padded = vec![None; len - values.len()];
        padded.extend(values);
        padded
    } else {
        values
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Holds the last accepted history and filters out unchanged reloads
#[derive(Debug)]
pub struct HistoryStore {
    max_len: usize,
    snapshot: TelemetrySnapshot,
    // timestamps as read, before truncation
    accepted: Vec<String>,
}

impl HistoryStore {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            snapshot: TelemetrySnapshot::default(),
            accepted: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    /// Load the raw history file content, `None` when the file is absent.
    ///
    /// Returns the current snapshot and whether it changed. A missing or
    /// unreadable document clears the snapshot rather than failing.
    pub fn load(&mut self, raw: Option<&[u8]>) -> (&TelemetrySnapshot, bool) {
        let decoded = match raw {
            Some(bytes) => TelemetrySnapshot::decode(bytes),
            None => Err(HistoryError::Missing),
        };

        match decoded {
            Ok(snapshot) => self.accept(snapshot),
            Err(err) => {
                match &err {
                    HistoryError::Malformed(_) => warn!("Discarding telemetry history: {}", err),
                    HistoryError::Missing | HistoryError::NoTimestamps => {
                        debug!("No telemetry history available: {}", err)
                    }
                }
                self.clear()
            }
        }
    }

    fn accept(&mut self, mut snapshot: TelemetrySnapshot) -> (&TelemetrySnapshot, bool) {
        if snapshot.timestamps == self.accepted {
            debug!("Data already up-to-date. No new data.");
            return (&self.snapshot, false);
        }

        self.accepted = snapshot.timestamps.clone();
        snapshot.truncate_to(self.max_len);
        if let Some((start, end)) = snapshot.time_span() {
            debug!(
                "Data loaded & cleaned: {} timestamps from {} to {}",
                snapshot.len(),
                start,
                end
            );
        }
        self.snapshot = snapshot;
        (&self.snapshot, true)
    }

    fn clear(&mut self) -> (&TelemetrySnapshot, bool) {
        let changed = !self.accepted.is_empty() || self.snapshot != TelemetrySnapshot::default();
        self.accepted.clear();
        self.snapshot = TelemetrySnapshot::default();
        (&self.snapshot, changed)
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_QUEUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_node_devkit::HistoryBuilder;

    #[test]
    fn test_truncation_keeps_aligned_suffix() {
        let builder = HistoryBuilder::new(12)
            .ramp("cpu_load", 0.0, 1.0)
            .ramp("occupied_memory", 100.0, 10.0);
        let original = builder.timestamps();

        let mut store = HistoryStore::new(5);
        let (snapshot, changed) = store.load(Some(&builder.to_bytes()));

        assert!(changed);
        assert_eq!(snapshot.len(), 5);
        assert_eq!(snapshot.timestamps, original[7..].to_vec());
        for values in snapshot.series.values() {
            assert_eq!(values.len(), 5);
        }
        assert_eq!(
            snapshot.series("cpu_load").unwrap(),
            &[Some(7.0), Some(8.0), Some(9.0), Some(10.0), Some(11.0)]
        );
        assert_eq!(snapshot.series("occupied_memory").unwrap()[0], Some(170.0));
    }

    #[test]
    fn test_identical_reload_is_not_a_change() {
        let raw = HistoryBuilder::new(4).ramp("cpu_load", 1.0, 1.0).running_node().to_bytes();
        let mut store = HistoryStore::new(DEFAULT_MAX_HISTORY_QUEUE);

        let (_, first) = store.load(Some(&raw));
        let before = store.snapshot().clone();
        let (snapshot, second) = store.load(Some(&raw));

        assert!(first);
        assert!(!second);
        assert_eq!(snapshot, &before);
    }

    #[test]
    fn test_same_timestamps_over_the_bound_stay_unchanged() {
        let raw = HistoryBuilder::new(8).ramp("cpu_load", 0.0, 1.0).to_bytes();
        let mut store = HistoryStore::new(3);

        assert!(store.load(Some(&raw)).1);
        assert!(!store.load(Some(&raw)).1);
        assert_eq!(store.snapshot().len(), 3);
    }

    #[test]
    fn test_new_sample_is_a_change() {
        let mut store = HistoryStore::default();
        store.load(Some(&HistoryBuilder::new(3).ramp("cpu_load", 0.0, 1.0).to_bytes()));

        let (snapshot, changed) =
            store.load(Some(&HistoryBuilder::new(4).ramp("cpu_load", 0.0, 1.0).to_bytes()));
        assert!(changed);
        assert_eq!(snapshot.len(), 4);
    }

    #[test]
    fn test_missing_file_clears_previous_data() {
        let mut store = HistoryStore::default();
        store.load(Some(&HistoryBuilder::new(3).running_node().to_bytes()));

        let (snapshot, changed) = store.load(None);
        assert!(changed);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.scalars, ScalarFields::default());

        // still absent: nothing new to report
        assert!(!store.load(None).1);
    }

    #[test]
    fn test_missing_file_on_empty_store_is_not_a_change() {
        let mut store = HistoryStore::default();
        let (snapshot, changed) = store.load(None);
        assert!(!changed);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_malformed_document_is_distinct_from_missing() {
        assert!(matches!(
            TelemetrySnapshot::decode(b"{\"timestamps\": [\"2024-05-01T12:00"),
            Err(HistoryError::Malformed(_))
        ));
        assert!(matches!(
            TelemetrySnapshot::decode(b"{\"cpu_load\": [1.0]}"),
            Err(HistoryError::NoTimestamps)
        ));
    }

    #[test]
    fn test_malformed_document_resolves_to_empty_snapshot() {
        let mut store = HistoryStore::default();
        store.load(Some(&HistoryBuilder::new(2).to_bytes()));

        let (snapshot, changed) = store.load(Some(b"not json"));
        assert!(changed);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_document_without_timestamps_counts_as_no_data() {
        let raw = HistoryBuilder::new(3).without_timestamps().running_node().to_bytes();
        let mut store = HistoryStore::default();
        let (snapshot, changed) = store.load(Some(&raw));
        assert!(!changed);
        assert_eq!(snapshot.scalars.epoch, UNKNOWN_NUMBER);
    }

    #[test]
    fn test_scalars_are_extracted_not_treated_as_series() {
        let raw = HistoryBuilder::new(2).ramp("cpu_load", 1.0, 1.0).running_node().to_bytes();
        let snapshot = TelemetrySnapshot::decode(&raw).unwrap();

        assert_eq!(snapshot.scalars.epoch, 42);
        assert_eq!(snapshot.scalars.epoch_avail, 0.9875);
        assert_eq!(snapshot.scalars.uptime, "1 day, 02:03:04");
        assert_eq!(snapshot.scalars.version, "2.4.1");
        assert_eq!(snapshot.series.keys().collect::<Vec<_>>(), vec!["cpu_load"]);
    }

    #[test]
    fn test_absent_scalars_default_to_sentinels() {
        let snapshot = TelemetrySnapshot::decode(&HistoryBuilder::new(1).to_bytes()).unwrap();
        assert_eq!(snapshot.scalars.epoch, -1);
        assert_eq!(snapshot.scalars.epoch_avail, -1.0);
        assert_eq!(snapshot.scalars.uptime, UNKNOWN_UPTIME);
        assert_eq!(snapshot.scalars.version, "");
    }

    #[test]
    fn test_series_are_aligned_to_timestamps() {
        let raw = HistoryBuilder::new(4)
            .series("gpu_load", [Some(1.0), Some(2.0)])
            .series("cpu_load", (0..6).map(|i| Some(i as f64)))
            .series("occupied_memory", [Some(1.0), None, Some(3.0), Some(4.0)])
            .to_bytes();
        let snapshot = TelemetrySnapshot::decode(&raw).unwrap();

        assert_eq!(snapshot.series("gpu_load").unwrap(), &[None, None, Some(1.0), Some(2.0)]);
        assert_eq!(
            snapshot.series("cpu_load").unwrap(),
            &[Some(2.0), Some(3.0), Some(4.0), Some(5.0)]
        );
        assert_eq!(snapshot.series("occupied_memory").unwrap()[1], None);
    }
}
