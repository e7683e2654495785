//! Dataset file behaviour across runs

use scaleprobe_core::{DegradedReason, StopCondition, TestConfiguration, TestResult};
use scaleprobe_output::{read_dataset, DatasetError, DatasetWriter, HEADER};
use std::collections::BTreeMap;
use std::time::Duration;

fn completed(test_id: u32, replicas: u32, rps: f64, baseline_rps: f64) -> TestResult {
    let config = TestConfiguration {
        test_id,
        replica_count: replicas,
        concurrency_level: 10,
        stop_condition: StopCondition::Duration(Duration::from_secs(15)),
        repetition_index: 0,
    };
    let mut result = TestResult::failed(&config, DegradedReason::ScaleFailed, Duration::ZERO);
    result.failure_reasons.clear();
    result.total_requests = (rps * 15.0) as u64;
    result.successful_requests = result.total_requests;
    result.success_rate = 1.0;
    result.rps = Some(rps);
    result.rps_per_replica = Some(rps / replicas as f64);
    result.latency_avg_ms = Some(41.7);
    result.per_instance_rps = (0..replicas)
        .map(|i| (format!("factorial-{}", i), rps / replicas as f64))
        .collect::<BTreeMap<_, _>>();
    result.max_instance_share = Some(1.0 / replicas as f64);
    result.load_balanced = true;
    result.scaling_efficiency_vs_baseline = if replicas == 1 {
        Some(100.0)
    } else {
        Some(100.0 * rps / (baseline_rps * replicas as f64))
    };
    result.test_duration = Duration::from_millis(15_250);
    result
}

#[test]
fn test_two_runs_append_four_rows_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results").join("scaling_dataset.csv");

    for run in 0..2 {
        let mut writer = DatasetWriter::open(&path).unwrap();
        writer.append(&completed(run * 2 + 1, 1, 120.0, 120.0)).unwrap();
        writer.append(&completed(run * 2 + 2, 2, 210.0, 120.0)).unwrap();
        assert_eq!(writer.rows_written(), 2);
    }

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.matches("timestamp,test_id").count(), 1);

    let rows = read_dataset(&path).unwrap();
    let ids: Vec<u32> = rows.iter().map(|r| r.test_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(rows[1].replicas, 2);
    assert_eq!(rows[1].per_instance_rps_distribution, "factorial-0:105.000;factorial-1:105.000");
    assert!(!rows[1].degraded);
    assert_eq!(rows[1].test_duration_s, 15.25);
}

#[test]
fn test_efficiency_is_reproducible_from_persisted_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dataset.csv");
    let mut writer = DatasetWriter::open(&path).unwrap();
    writer.append(&completed(1, 1, 97.3, 97.3)).unwrap();
    writer.append(&completed(2, 3, 251.9, 97.3)).unwrap();
    drop(writer);

    let rows = read_dataset(&path).unwrap();
    let baseline_rps = rows[0].rps.unwrap();
    for row in &rows {
        let recomputed = 100.0 * row.rps.unwrap() / (baseline_rps * row.replicas as f64);
        let stored = row.scaling_efficiency_vs_baseline.unwrap();
        assert!((recomputed - stored).abs() < 1e-9, "{recomputed} vs {stored}");
    }
    assert_eq!(rows[0].scaling_efficiency_vs_baseline, Some(100.0));
}

#[test]
fn test_degraded_row_keeps_nulls_and_reasons() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dataset.csv");
    let config = TestConfiguration {
        test_id: 7,
        replica_count: 4,
        concurrency_level: 20,
        stop_condition: StopCondition::RequestCount(500),
        repetition_index: 2,
    };
    let mut result = TestResult::failed(&config, DegradedReason::ReadinessTimeout, Duration::from_secs(90));
    result.failure_reasons.push(DegradedReason::BaselineMissing);

    let mut writer = DatasetWriter::open(&path).unwrap();
    writer.append(&result).unwrap();

    let rows = read_dataset(&path).unwrap();
    let row = &rows[0];
    assert!(row.degraded);
    assert_eq!(row.rps, None);
    assert_eq!(row.scaling_efficiency_vs_baseline, None);
    assert_eq!(row.stop_condition, "requests:500");
    assert_eq!(row.failure_reason, "readiness_timeout;baseline_missing");
    assert_eq!(
        row.failure_reasons(),
        vec![DegradedReason::ReadinessTimeout, DegradedReason::BaselineMissing]
    );
}

#[test]
fn test_mismatched_header_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.csv");
    std::fs::write(&path, "Replicas,RPS,Efficiency\n1,100,100\n").unwrap();

    assert!(matches!(
        DatasetWriter::open(&path),
        Err(DatasetError::HeaderMismatch { .. })
    ));
    // untouched
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "Replicas,RPS,Efficiency\n1,100,100\n"
    );
}

#[test]
fn test_empty_existing_file_gets_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.csv");
    std::fs::File::create(&path).unwrap();

    DatasetWriter::open(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.trim_end(), HEADER.join(","));
    assert!(read_dataset(&path).unwrap().is_empty());
}
