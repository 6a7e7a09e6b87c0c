//! Persistent result store
//!
//! Results are kept as `benchmark -> field -> mode -> value` and written as a
//! single JSON document:
//!
//! ```json
//! {
//!   "timeouts": { "no-opts": 600, "det": null },
//!   "results": {
//!     "coin.dice": { "time": { "no-opts": 0.1234 }, "size": { "no-opts": -1 } }
//!   }
//! }
//! ```
//!
//! In the document `null` means never measured and `-1` marks a failed
//! attempt. In memory both are explicit variants of [`MetricValue`], so a
//! failure can never be compared as if it were a measurement.

use super::field::Field;
use super::mode::Mode;
use crate::error::{HarnessError, Result};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Encoded value of a failed attempt
const FAILED_SENTINEL: i64 = -1;

/// A successful measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    /// Wall-clock seconds
    Seconds(f64),
    /// Any counted quantity
    Count(u64),
}

impl Measurement {
    pub fn as_f64(self) -> f64 {
        match self {
            Measurement::Seconds(s) => s,
            Measurement::Count(c) => c as f64,
        }
    }
}

/// Stored state of one (benchmark, field, mode) entry
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MetricValue {
    /// Never attempted, or last attempt timed out
    #[default]
    Unset,
    Measured(Measurement),
    /// Last attempt completed without parseable output
    Failed,
}

impl MetricValue {
    pub fn seconds(s: f64) -> Self {
        MetricValue::Measured(Measurement::Seconds(s))
    }

    pub fn count(c: u64) -> Self {
        MetricValue::Measured(Measurement::Count(c))
    }

    /// True only for a real measurement; drives the skip policy
    pub fn is_valid(&self) -> bool {
        matches!(self, MetricValue::Measured(_))
    }

    pub fn measurement(&self) -> Option<Measurement> {
        match self {
            MetricValue::Measured(m) => Some(*m),
            _ => None,
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            MetricValue::Unset => serializer.serialize_none(),
            MetricValue::Failed => serializer.serialize_i64(FAILED_SENTINEL),
            MetricValue::Measured(Measurement::Count(c)) => serializer.serialize_u64(*c),
            MetricValue::Measured(Measurement::Seconds(s)) => serializer.serialize_f64(*s),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<serde_json::Number>::deserialize(deserializer)?;
        let Some(number) = raw else {
            return Ok(MetricValue::Unset);
        };

        if let Some(c) = number.as_u64() {
            return Ok(MetricValue::count(c));
        }
        if number.as_i64() == Some(FAILED_SENTINEL) {
            return Ok(MetricValue::Failed);
        }
        match number.as_f64() {
            Some(s) if s == FAILED_SENTINEL as f64 => Ok(MetricValue::Failed),
            Some(s) if s >= 0.0 && s.is_finite() => Ok(MetricValue::seconds(s)),
            _ => Err(de::Error::custom(format!(
                "invalid metric value {number}: expected a non-negative number, -1 or null"
            ))),
        }
    }
}

/// Values of one field, per mode
pub type ModeValues = BTreeMap<Mode, MetricValue>;

/// All fields recorded for one benchmark
pub type FieldValues = BTreeMap<Field, ModeValues>;

/// `benchmark file name -> field -> mode -> value`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultTable {
    entries: BTreeMap<String, FieldValues>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Benchmark names in sorted order
    pub fn benchmarks(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn fields_of(&self, benchmark: &str) -> Option<&FieldValues> {
        self.entries.get(benchmark)
    }

    /// Stored value; anything absent reads as `Unset`
    pub fn get(&self, benchmark: &str, field: Field, mode: Mode) -> MetricValue {
        self.entries
            .get(benchmark)
            .and_then(|fields| fields.get(&field))
            .and_then(|modes| modes.get(&mode))
            .copied()
            .unwrap_or_default()
    }

    pub fn has_field(&self, benchmark: &str, field: Field) -> bool {
        self.entries
            .get(benchmark)
            .is_some_and(|fields| fields.contains_key(&field))
    }

    pub fn set(&mut self, benchmark: &str, field: Field, mode: Mode, value: MetricValue) {
        self.entries
            .entry(benchmark.to_string())
            .or_default()
            .entry(field)
            .or_default()
            .insert(mode, value);
    }

    /// Create `Unset` slots for every requested pair that has none yet
    ///
    /// Existing values, and fields or modes outside the request, are left
    /// untouched.
    pub fn prepare(&mut self, benchmark: &str, fields: &[Field], modes: &[Mode]) {
        let record = self.entries.entry(benchmark.to_string()).or_default();
        for field in fields {
            let slots = record.entry(*field).or_default();
            for mode in modes {
                slots.entry(*mode).or_default();
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_document(path).map(Option::unwrap_or_default)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_document(path, self)
    }
}

/// The persisted document: last-used timeouts and the result table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    /// Timeout in seconds used for each mode's most recent run
    #[serde(default)]
    pub timeouts: BTreeMap<Mode, Option<u64>>,
    #[serde(default)]
    pub results: ResultTable,
}

impl Default for ResultDocument {
    fn default() -> Self {
        Self {
            timeouts: Mode::ALL.iter().map(|m| (*m, None)).collect(),
            results: ResultTable::new(),
        }
    }
}

impl ResultDocument {
    /// Load the document at `path`, or start a fresh one if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        read_document(path).map(Option::unwrap_or_default)
    }

    /// Overwrite `path` with the whole document
    pub fn save(&self, path: &Path) -> Result<()> {
        write_document(path, self)
    }

    pub fn record_timeout(&mut self, mode: Mode, timeout_secs: Option<u64>) {
        self.timeouts.insert(mode, timeout_secs);
    }

    pub fn timeout_for(&self, mode: Mode) -> Option<u64> {
        self.timeouts.get(&mode).copied().flatten()
    }
}

fn read_document<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(HarnessError::store(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| HarnessError::store(path, e))
}

/// Serialize next to the target and rename over it, so an interrupted write
/// never leaves a truncated document behind.
fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, json + "\n").map_err(|e| HarnessError::store(path, e))?;
    fs::rename(&tmp, path).map_err(|e| HarnessError::store(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_value_encoding() {
        assert_eq!(serde_json::to_string(&MetricValue::Unset).unwrap(), "null");
        assert_eq!(serde_json::to_string(&MetricValue::Failed).unwrap(), "-1");
        assert_eq!(serde_json::to_string(&MetricValue::count(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&MetricValue::seconds(1.5)).unwrap(), "1.5");
    }

    #[test]
    fn test_value_decoding() {
        let v: MetricValue = serde_json::from_str("null").unwrap();
        assert_eq!(v, MetricValue::Unset);
        let v: MetricValue = serde_json::from_str("-1").unwrap();
        assert_eq!(v, MetricValue::Failed);
        let v: MetricValue = serde_json::from_str("-1.0").unwrap();
        assert_eq!(v, MetricValue::Failed);
        let v: MetricValue = serde_json::from_str("7").unwrap();
        assert_eq!(v, MetricValue::count(7));
        let v: MetricValue = serde_json::from_str("0.25").unwrap();
        assert_eq!(v, MetricValue::seconds(0.25));
    }

    #[test]
    fn test_rejects_other_negatives() {
        assert!(serde_json::from_str::<MetricValue>("-3").is_err());
        assert!(serde_json::from_str::<MetricValue>("\"fast\"").is_err());
    }

    #[test]
    fn test_failed_is_not_valid() {
        assert!(!MetricValue::Failed.is_valid());
        assert!(!MetricValue::Unset.is_valid());
        assert!(MetricValue::count(0).is_valid());
        assert_eq!(MetricValue::Failed.measurement(), None);
    }

    #[test]
    fn test_prepare_keeps_existing_values() {
        let mut table = ResultTable::new();
        table.set("a.dice", Field::Time, Mode::Det, MetricValue::seconds(2.0));
        table.set("a.dice", Field::Size, Mode::Ea, MetricValue::count(9));
        table.prepare("a.dice", &[Field::Time], &[Mode::Det, Mode::Fh]);

        assert_eq!(table.get("a.dice", Field::Time, Mode::Det), MetricValue::seconds(2.0));
        assert_eq!(table.get("a.dice", Field::Time, Mode::Fh), MetricValue::Unset);
        assert!(table.fields_of("a.dice").unwrap()[&Field::Time].contains_key(&Mode::Fh));
        assert_eq!(table.get("a.dice", Field::Size, Mode::Ea), MetricValue::count(9));
        assert!(!table.fields_of("a.dice").unwrap()[&Field::Size].contains_key(&Mode::Det));
    }

    #[test]
    fn test_missing_entries_read_as_unset() {
        let table = ResultTable::new();
        assert_eq!(table.get("nope.dice", Field::Calls, Mode::Fh), MetricValue::Unset);
        assert!(!table.has_field("nope.dice", Field::Calls));
    }

    #[test]
    fn test_fresh_document_lists_all_modes() {
        let doc = ResultDocument::default();
        assert_eq!(doc.timeouts.len(), Mode::ALL.len());
        assert!(doc.timeouts.values().all(Option::is_none));
        assert!(doc.results.is_empty());
    }

    #[test]
    fn test_load_missing_file_is_fresh() {
        let dir = TempDir::new().unwrap();
        let doc = ResultDocument::load(&dir.path().join("results.json")).unwrap();
        assert_eq!(doc, ResultDocument::default());
    }

    #[test]
    fn test_load_corrupt_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        fs::write(&path, "{ not json").unwrap();
        let err = ResultDocument::load(&path).unwrap_err();
        assert_eq!(err.error_code(), "STORE_ERROR");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");

        let mut doc = ResultDocument::default();
        doc.record_timeout(Mode::Det, Some(600));
        doc.results.prepare("b.dice", &[Field::Size, Field::Calls], &[Mode::Det]);
        doc.results.set("b.dice", Field::Size, Mode::Det, MetricValue::count(42));
        doc.results.set("c.dice", Field::Time, Mode::NoOpts, MetricValue::seconds(3.0));
        doc.results.set("c.dice", Field::Flips, Mode::NoOpts, MetricValue::Failed);
        doc.save(&path).unwrap();

        let loaded = ResultDocument::load(&path).unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(loaded.timeout_for(Mode::Det), Some(600));
        assert_eq!(loaded.timeout_for(Mode::Fh), None);
        assert!(!dir.path().join("results.json.tmp").exists());
    }

    #[test]
    fn test_reads_document_with_missing_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        fs::write(&path, r#"{"results": {"x.dice": {"size": {"det": 5}}}}"#).unwrap();
        let doc = ResultDocument::load(&path).unwrap();
        assert!(doc.timeouts.is_empty());
        assert_eq!(doc.results.get("x.dice", Field::Size, Mode::Det), MetricValue::count(5));
    }

    #[test]
    fn test_reads_document_keyed_by_descriptive_mode_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        fs::write(
            &path,
            r#"{
  "timeouts": {"det + be": 600, "no opts": null, "eg + sbk + fh + det + be": 300},
  "results": {
    "a.dice": {
      "time": {"det + be": 1.5, "no opts": null},
      "size": {"eg + sbk + fh + det + be": 42, "eg + sbk + fh + ct + det + be": -1, "ea": 7}
    }
  }
}"#,
        )
        .unwrap();

        let doc = ResultDocument::load(&path).unwrap();
        assert_eq!(doc.timeout_for(Mode::Det), Some(600));
        assert_eq!(doc.timeout_for(Mode::NoOpts), None);
        assert_eq!(doc.timeout_for(Mode::EaSbkFh), Some(300));
        assert_eq!(doc.results.get("a.dice", Field::Time, Mode::Det), MetricValue::seconds(1.5));
        assert_eq!(doc.results.get("a.dice", Field::Time, Mode::NoOpts), MetricValue::Unset);
        assert_eq!(doc.results.get("a.dice", Field::Size, Mode::EaSbkFh), MetricValue::count(42));
        assert_eq!(doc.results.get("a.dice", Field::Size, Mode::EaSbkFhct), MetricValue::Failed);
        assert_eq!(doc.results.get("a.dice", Field::Size, Mode::Ea), MetricValue::count(7));

        // Saving rewrites the keys as mode ids.
        doc.save(&path).unwrap();
        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains("\"ea-sbk-fh\": 42"));
        assert!(!saved.contains("det + be"));
    }

    fn value_strategy() -> impl Strategy<Value = MetricValue> {
        prop_oneof![
            Just(MetricValue::Unset),
            Just(MetricValue::Failed),
            any::<u32>().prop_map(|c| MetricValue::count(u64::from(c))),
            (0u32..1_000_000).prop_map(|n| MetricValue::seconds(f64::from(n) / 10_000.0 + 0.5)),
        ]
    }

    proptest! {
        #[test]
        fn prop_table_round_trips(
            cells in proptest::collection::vec(
                ("[a-z]{1,6}\\.dice", 0usize..6, 0usize..14, value_strategy()),
                0..24,
            )
        ) {
            let mut table = ResultTable::new();
            for (name, f, m, value) in cells {
                table.set(&name, Field::ALL[f], Mode::ALL[m], value);
            }
            let json = serde_json::to_string(&table).unwrap();
            let back: ResultTable = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, table);
        }
    }
}
