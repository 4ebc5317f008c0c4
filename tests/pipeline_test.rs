//! End-to-end scenarios over the library: tracker, aggregator, feature
//! contract and generator wired together without HTTP or a database.

use chrono::{DateTime, Duration, TimeZone, Utc};

use smartnet_pipeline::{
    aggregate::{aggregate, default_window},
    features::FeatureContract,
    generator::{node_ids, GeneratorParams, TelemetryGenerator},
    features::FEATURE_COLUMNS,
    training::{Split, TrainingDataset, TrainingSet, DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION},
    LatestStateTracker, Reading,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn reading(node: &str, minutes: i64, latency_ms: f64, failure: Option<bool>) -> Reading {
    // ---
    Reading {
        node_id: node.to_string(),
        timestamp: t0() + Duration::minutes(minutes),
        latency_ms,
        jitter_ms: 2.0 + latency_ms / 10.0,
        rssi_dbm: -65.0,
        noise_dbm: -90.0 - latency_ms / 10.0,
        failure,
    }
}

#[test]
fn three_readings_one_failure_make_one_failing_window() {
    // ---
    let history = vec![
        reading("node-01", 0, 18.0, Some(false)),
        reading("node-01", 5, 24.0, Some(true)),
        reading("node-01", 10, 21.0, None),
    ];

    let agg = aggregate(&history, default_window()).unwrap();

    assert_eq!(agg.rows.len(), 1);
    let row = &agg.rows[0];
    assert_eq!(row.node_id, "node-01");
    assert_eq!(row.window_start, t0());
    assert!(row.label);
    assert!((row.latency_ms.mean - 21.0).abs() < 1e-12);
    assert_eq!(agg.labels(), vec![1]);
}

#[test]
fn stale_upsert_keeps_newer_reading() {
    // ---
    let tracker = LatestStateTracker::new();
    tracker.upsert(reading("node-01", 10, 11.0, None));
    tracker.upsert(reading("node-01", 5, 55.0, None));

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].timestamp, t0() + Duration::minutes(10));
    assert_eq!(snapshot[0].latency_ms, 11.0);
    assert_eq!(tracker.stats().stale_discarded, 1);
}

#[test]
fn seeded_generator_feeds_a_trainable_dataset() {
    // ---
    let params = GeneratorParams::default();
    let mut generator = TelemetryGenerator::new(Some(42)).unwrap();
    let tracker = LatestStateTracker::new();
    let ids = node_ids(3);

    // one batch every 5 minutes for four hours
    let mut history = Vec::new();
    for step in 0..48 {
        let at = t0() + Duration::minutes(5 * step);
        for id in &ids {
            let r = generator.generate_at(id, &params, at);
            tracker.upsert(r.clone());
            history.push(r);
        }
    }

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.len(), 3);
    assert!(snapshot
        .iter()
        .all(|s| s.timestamp == t0() + Duration::minutes(5 * 47)));

    let agg = aggregate(&history, default_window()).unwrap();
    // 16 windows of 3 readings per node
    assert_eq!(agg.rows.len(), 3 * 16);
    assert!(agg.rows.iter().all(|r| r.sample_count == 3));

    let set = TrainingSet::prepare(&agg, &FeatureContract::default()).unwrap();
    assert_eq!(set.len(), 48);
    assert!(!agg.is_degenerate());

    let dataset =
        TrainingDataset::build(&agg, &set, DEFAULT_TEST_FRACTION, DEFAULT_SPLIT_SEED).unwrap();
    assert_eq!(dataset.columns, FEATURE_COLUMNS);
    assert_eq!(dataset.train_size + dataset.validation_size, 48);
    assert!(dataset.validation_size > 0);
    for (record, row) in dataset.records.iter().zip(&agg.rows) {
        assert_eq!(record.node_id, row.node_id);
        assert_eq!(record.features, row.feature_vector().to_vec());
        assert_eq!(record.label, u8::from(row.label));
    }
    let validation_failing = dataset
        .records
        .iter()
        .filter(|r| r.split == Split::Validation && r.label == 1)
        .count();
    assert!(validation_failing > 0);
}

#[test]
fn generator_stream_is_reproducible() {
    // ---
    let params = GeneratorParams::new(0.0, 0.0).unwrap();
    let first = |seed| {
        TelemetryGenerator::new(Some(seed))
            .unwrap()
            .generate_at("node-01", &params, t0())
    };

    let a = first(42);
    let b = first(42);
    assert_eq!(a, b);
    assert_eq!(a.latency_ms.to_bits(), b.latency_ms.to_bits());
    assert_ne!(a, first(43));
}
