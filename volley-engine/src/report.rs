//! End-of-run report

use crate::latency::{render_table, OperationStats};
use crate::scheduler::RunSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub generated_at: DateTime<Utc>,
    pub summary: RunSummary,
    /// Registered clients at the end of the run
    pub clients: usize,
    pub operations: Vec<OperationStats>,
}

impl LoadReport {
    pub fn new(summary: RunSummary, clients: usize, operations: Vec<OperationStats>) -> Self {
        Self {
            generated_at: Utc::now(),
            summary,
            clients,
            operations,
        }
    }

    pub fn render_text(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Run finished in {:.1}s: {} cycles launched, {} completed, {} failed, {} idle, {} dropped",
            s.elapsed_ms as f64 / 1000.0,
            s.launched,
            s.completed,
            s.failed,
            s.idle,
            s.dropped
        );
        let _ = writeln!(
            out,
            "Clients registered: {}{}",
            self.clients,
            if s.drained_gracefully {
                ""
            } else {
                " (in-flight cycles were cancelled)"
            }
        );
        out.push('\n');
        out.push_str(&render_table(&self.operations));
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(io::Error::other)?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latency::LatencyRecorder;
    use std::time::Duration;

    fn report() -> LoadReport {
        let recorder = LatencyRecorder::new();
        recorder.record("POST /acme/new-reg", Duration::from_millis(12));
        recorder.record("HEAD /directory", Duration::from_millis(2));
        let summary = RunSummary {
            launched: 10,
            completed: 8,
            failed: 2,
            idle: 0,
            dropped: 0,
            drained_gracefully: true,
            elapsed_ms: 1000,
        };
        LoadReport::new(summary, 3, recorder.snapshot())
    }

    #[test]
    fn test_text_report() {
        let text = report().render_text();
        assert!(text.contains("10 cycles launched"));
        assert!(text.contains("Clients registered: 3\n"));
        assert!(text.contains("POST /acme/new-reg"));
        assert!(text.contains("HEAD /directory"));
    }

    #[test]
    fn test_json_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report().write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(value["generated_at"].is_string());
        assert_eq!(value["summary"]["launched"], 10);
        assert_eq!(value["clients"], 3);
        assert_eq!(value["operations"].as_array().unwrap().len(), 2);
        assert_eq!(value["operations"][0]["operation"], "HEAD /directory");
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.json");
        assert!(report().write_json(&path).is_err());
    }
}
