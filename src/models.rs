//! Data models for the telemetry pipeline.
//!
//! [`ReadingIn`] is what producers send over the wire; validation turns it
//! into an immutable [`Reading`], the only shape the core ever sees.
//! [`StatusItem`] is the per-node live view served by `/status`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

// ---

/// Longest node identifier accepted at ingestion.
pub const NODE_ID_MAX_LEN: usize = 64;

/// Raw sensor sample as sent by a producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingIn {
    // ---
    pub node_id: String,

    /// Absent timestamps are stamped with the ingesting tracker's clock.
    #[serde(
        default,
        alias = "ts",
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    pub latency_ms: f64,
    pub jitter_ms: f64,
    pub rssi_dbm: f64,
    pub noise_dbm: f64,
    #[serde(default)]
    pub failure: Option<bool>,
}

/// Batch body accepted by `POST /ingest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestBatch {
    pub readings: Vec<ReadingIn>,
}

/// One validated sensor sample, timestamp normalized to UTC.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Reading {
    // ---
    pub node_id: String,
    #[sqlx(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub latency_ms: f64,
    pub jitter_ms: f64,
    pub rssi_dbm: f64,
    pub noise_dbm: f64,
    pub failure: Option<bool>,
}

/// Last known condition of one node. Carries no failure flag: status is
/// live telemetry, not a training label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusItem {
    // ---
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: f64,
    pub jitter_ms: f64,
    pub rssi_dbm: f64,
    pub noise_dbm: f64,
}

// ---

impl ReadingIn {
    /// Validate and freeze this sample, stamping `now` when no timestamp
    /// was supplied.
    pub fn into_reading(self, now: DateTime<Utc>) -> Result<Reading, ValidationError> {
        // ---
        let len = self.node_id.chars().count();
        if len == 0 || len > NODE_ID_MAX_LEN {
            return Err(ValidationError::NodeIdLength { len });
        }

        check_non_negative("latency_ms", self.latency_ms)?;
        check_non_negative("jitter_ms", self.jitter_ms)?;
        check_finite("rssi_dbm", self.rssi_dbm)?;
        check_finite("noise_dbm", self.noise_dbm)?;

        Ok(Reading {
            node_id: self.node_id,
            timestamp: self.timestamp.unwrap_or(now),
            latency_ms: self.latency_ms,
            jitter_ms: self.jitter_ms,
            rssi_dbm: self.rssi_dbm,
            noise_dbm: self.noise_dbm,
            failure: self.failure,
        })
    }
}

impl IngestBatch {
    /// Validate every reading; the whole batch is rejected on the first
    /// invalid one.
    pub fn into_readings(self, now: DateTime<Utc>) -> Result<Vec<Reading>, ValidationError> {
        // ---
        if self.readings.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }

        self.readings
            .into_iter()
            .enumerate()
            .map(|(index, r)| {
                r.into_reading(now).map_err(|e| ValidationError::InBatch {
                    index,
                    source: Box::new(e),
                })
            })
            .collect()
    }
}

impl Reading {
    /// Training label: unknown counts as no failure.
    pub fn failed(&self) -> bool {
        self.failure.unwrap_or(false)
    }

    pub fn to_status(&self) -> StatusItem {
        // ---
        StatusItem {
            node_id: self.node_id.clone(),
            timestamp: self.timestamp,
            latency_ms: self.latency_ms,
            jitter_ms: self.jitter_ms,
            rssi_dbm: self.rssi_dbm,
            noise_dbm: self.noise_dbm,
        }
    }
}

impl From<Reading> for ReadingIn {
    fn from(r: Reading) -> Self {
        // ---
        ReadingIn {
            node_id: r.node_id,
            timestamp: Some(r.timestamp),
            latency_ms: r.latency_ms,
            jitter_ms: r.jitter_ms,
            rssi_dbm: r.rssi_dbm,
            noise_dbm: r.noise_dbm,
            failure: r.failure,
        }
    }
}

// ---

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    check_finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::Negative { field, value })
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NotFinite { field, value })
    }
}

/// Accept RFC 3339 with any offset (converted to UTC) or a naive ISO 8601
/// timestamp, which is taken to already be UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    // ---
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    parse_timestamp(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    // ---
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn create_test_reading_in(node_id: &str, latency_ms: f64, jitter_ms: f64) -> ReadingIn {
        // ---
        ReadingIn {
            node_id: node_id.to_string(),
            timestamp: Some(Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap()),
            latency_ms,
            jitter_ms,
            rssi_dbm: -65.0,
            noise_dbm: -90.0,
            failure: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_valid_reading_is_preserved() {
        // ---
        let reading = create_test_reading_in("node-01", 21.5, 3.2)
            .into_reading(now())
            .unwrap();

        assert_eq!(reading.node_id, "node-01");
        assert_eq!(reading.latency_ms, 21.5);
        assert_eq!(reading.jitter_ms, 3.2);
        assert_eq!(reading.timestamp.hour(), 18);
        assert!(!reading.failed());
    }

    #[test]
    fn test_missing_timestamp_is_stamped() {
        // ---
        let mut raw = create_test_reading_in("node-01", 20.0, 3.0);
        raw.timestamp = None;

        let reading = raw.into_reading(now()).unwrap();
        assert_eq!(reading.timestamp, now());
    }

    #[test]
    fn test_node_id_bounds() {
        // ---
        let empty = create_test_reading_in("", 20.0, 3.0).into_reading(now());
        assert_eq!(empty, Err(ValidationError::NodeIdLength { len: 0 }));

        let edge = "n".repeat(NODE_ID_MAX_LEN);
        assert!(create_test_reading_in(&edge, 20.0, 3.0)
            .into_reading(now())
            .is_ok());

        let long = "n".repeat(NODE_ID_MAX_LEN + 1);
        assert!(create_test_reading_in(&long, 20.0, 3.0)
            .into_reading(now())
            .is_err());
    }

    #[test]
    fn test_negative_metrics_rejected() {
        // ---
        let lat = create_test_reading_in("node-01", -0.1, 3.0).into_reading(now());
        assert!(matches!(
            lat,
            Err(ValidationError::Negative { field: "latency_ms", .. })
        ));

        let jit = create_test_reading_in("node-01", 20.0, -1.0).into_reading(now());
        assert!(matches!(
            jit,
            Err(ValidationError::Negative { field: "jitter_ms", .. })
        ));

        // Zero is a legal edge
        assert!(create_test_reading_in("node-01", 0.0, 0.0)
            .into_reading(now())
            .is_ok());
    }

    #[test]
    fn test_non_finite_latency_and_jitter_rejected() {
        // ---
        let nan = create_test_reading_in("node-01", f64::NAN, 3.0).into_reading(now());
        assert!(matches!(
            nan,
            Err(ValidationError::NotFinite { field: "latency_ms", .. })
        ));

        let inf = create_test_reading_in("node-01", 20.0, f64::INFINITY).into_reading(now());
        assert!(matches!(
            inf,
            Err(ValidationError::NotFinite { field: "jitter_ms", .. })
        ));

        let neg_inf = create_test_reading_in("node-01", f64::NEG_INFINITY, 3.0).into_reading(now());
        assert!(matches!(neg_inf, Err(ValidationError::NotFinite { .. })));
    }

    #[test]
    fn test_empty_batch_rejected() {
        // ---
        let batch = IngestBatch { readings: vec![] };
        assert_eq!(batch.into_readings(now()), Err(ValidationError::EmptyBatch));
    }

    #[test]
    fn test_batch_reports_offending_index() {
        // ---
        let batch = IngestBatch {
            readings: vec![
                create_test_reading_in("node-01", 20.0, 3.0),
                create_test_reading_in("node-02", -5.0, 3.0),
            ],
        };

        match batch.into_readings(now()) {
            Err(ValidationError::InBatch { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected InBatch error, got {other:?}"),
        }
    }

    #[test]
    fn test_timestamp_parsing_normalizes_to_utc() {
        // ---
        let zulu = parse_timestamp("2025-03-26T18:45:00Z").unwrap();
        let offset = parse_timestamp("2025-03-26T13:45:00-05:00").unwrap();
        let naive = parse_timestamp("2025-03-26T18:45:00").unwrap();

        assert_eq!(zulu, offset);
        assert_eq!(zulu, naive);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_wire_format_accepts_ts_alias() {
        // ---
        let json = r#"{"node_id":"node-07","ts":"2025-03-26T20:45:00+02:00",
            "latency_ms":12.0,"jitter_ms":1.5,"rssi_dbm":-70.0,"noise_dbm":-88.0,"failure":true}"#;
        let raw: ReadingIn = serde_json::from_str(json).unwrap();

        assert_eq!(raw.timestamp.unwrap().hour(), 18);
        assert_eq!(raw.failure, Some(true));

        let bare = r#"{"node_id":"node-07","latency_ms":1.0,"jitter_ms":1.0,"rssi_dbm":0.0,"noise_dbm":0.0}"#;
        let raw: ReadingIn = serde_json::from_str(bare).unwrap();
        assert!(raw.timestamp.is_none());
        assert!(raw.failure.is_none());
    }

    #[test]
    fn test_status_drops_failure_flag() {
        // ---
        let mut raw = create_test_reading_in("node-01", 20.0, 3.0);
        raw.failure = Some(true);
        let reading = raw.into_reading(now()).unwrap();

        let status = serde_json::to_value(reading.to_status()).unwrap();
        assert!(status.get("failure").is_none());
        assert_eq!(status["node_id"], "node-01");
    }
}
