//! Per-operation latency histograms

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Samples are stored in microseconds; anything above a minute is clamped.
const MAX_TRACKABLE_MICROS: u64 = 60_000_000;
const SIGNIFICANT_FIGURES: u8 = 3;

/// Thread-safe map from operation label to latency histogram
#[derive(Debug, Default)]
pub struct LatencyRecorder {
    histograms: Mutex<BTreeMap<String, Histogram<u64>>>,
}

/// Summary statistics of one labelled operation, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationStats {
    pub operation: String,
    pub count: u64,
    pub min_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
}

impl LatencyRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample under `label`
    pub fn record(&self, label: &str, elapsed: Duration) {
        let micros = (elapsed.as_micros() as u64).clamp(1, MAX_TRACKABLE_MICROS);

        let mut histograms = self.histograms.lock();
        let histogram = match histograms.entry(label.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                match Histogram::new_with_bounds(1, MAX_TRACKABLE_MICROS, SIGNIFICANT_FIGURES) {
                    Ok(histogram) => entry.insert(histogram),
                    Err(e) => {
                        warn!(label, "Failed to create latency histogram: {}", e);
                        return;
                    }
                }
            }
        };
        histogram.saturating_record(micros);
    }

    /// Number of samples recorded under `label`
    pub fn count(&self, label: &str) -> u64 {
        self.histograms.lock().get(label).map_or(0, |h| h.len())
    }

    /// Total number of samples across all labels
    pub fn total_count(&self) -> u64 {
        self.histograms.lock().values().map(|h| h.len()).sum()
    }

    /// Statistics for every label, ordered by label
    pub fn snapshot(&self) -> Vec<OperationStats> {
        let histograms = self.histograms.lock();
        histograms
            .iter()
            .map(|(operation, h)| OperationStats {
                operation: operation.clone(),
                count: h.len(),
                min_ms: micros_to_ms(h.min()),
                p50_ms: micros_to_ms(h.value_at_quantile(0.50)),
                p90_ms: micros_to_ms(h.value_at_quantile(0.90)),
                p99_ms: micros_to_ms(h.value_at_quantile(0.99)),
                max_ms: micros_to_ms(h.max()),
                mean_ms: h.mean() / 1000.0,
            })
            .collect()
    }
}

fn micros_to_ms(micros: u64) -> f64 {
    micros as f64 / 1000.0
}

impl fmt::Display for LatencyRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_table(f, &self.snapshot())
    }
}

/// Render `stats` as an aligned text table
pub fn render_table(stats: &[OperationStats]) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_table(&mut out, stats);
    out
}

fn write_table(out: &mut dyn fmt::Write, stats: &[OperationStats]) -> fmt::Result {
    if stats.is_empty() {
        return writeln!(out, "(no samples recorded)");
    }

    let width = stats
        .iter()
        .map(|s| s.operation.len())
        .max()
        .unwrap_or(0)
        .max("operation".len());

    writeln!(
        out,
        "{:<width$} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "operation", "count", "min", "p50", "p90", "p99", "max", "mean"
    )?;
    for s in stats {
        writeln!(
            out,
            "{:<width$} {:>8} {:>8.2}ms {:>8.2}ms {:>8.2}ms {:>8.2}ms {:>8.2}ms {:>8.2}ms",
            s.operation, s.count, s.min_ms, s.p50_ms, s.p90_ms, s.p99_ms, s.max_ms, s.mean_ms
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_and_count() {
        let recorder = LatencyRecorder::new();
        recorder.record("HEAD /directory", Duration::from_millis(3));
        recorder.record("HEAD /directory", Duration::from_millis(5));
        recorder.record("POST /acme/new-reg", Duration::from_millis(40));

        assert_eq!(recorder.count("HEAD /directory"), 2);
        assert_eq!(recorder.count("POST /acme/new-reg"), 1);
        assert_eq!(recorder.count("POST /acme/new-cert"), 0);
        assert_eq!(recorder.total_count(), 3);
    }

    #[test]
    fn test_snapshot_statistics() {
        let recorder = LatencyRecorder::new();
        for ms in 1..=100 {
            recorder.record("op", Duration::from_millis(ms));
        }

        let stats = recorder.snapshot();
        assert_eq!(stats.len(), 1);
        let op = &stats[0];
        assert_eq!(op.count, 100);
        assert!((op.min_ms - 1.0).abs() < 0.01);
        assert!((op.max_ms - 100.0).abs() < 0.1);
        assert!((op.p50_ms - 50.0).abs() < 0.1);
        assert!((op.mean_ms - 50.5).abs() < 0.1);
    }

    #[test]
    fn test_oversized_sample_is_clamped() {
        let recorder = LatencyRecorder::new();
        recorder.record("slow", Duration::from_secs(3600));
        recorder.record("instant", Duration::ZERO);

        assert_eq!(recorder.count("slow"), 1);
        assert_eq!(recorder.count("instant"), 1);
    }

    #[test]
    fn test_concurrent_recording() {
        let recorder = Arc::new(LatencyRecorder::new());
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let recorder = recorder.clone();
                scope.spawn(move || {
                    for i in 0..250 {
                        recorder.record("op", Duration::from_micros(i + 1));
                    }
                });
            }
        });
        assert_eq!(recorder.count("op"), 2000);
    }

    #[test]
    fn test_display_lists_every_label() {
        let recorder = LatencyRecorder::new();
        assert!(recorder.to_string().contains("no samples"));

        recorder.record("HEAD /directory", Duration::from_millis(2));
        recorder.record("POST /acme/new-authz", Duration::from_millis(20));

        let rendered = recorder.to_string();
        assert!(rendered.contains("HEAD /directory"));
        assert!(rendered.contains("POST /acme/new-authz"));
        assert!(rendered.lines().next().unwrap().starts_with("operation"));
    }
}
