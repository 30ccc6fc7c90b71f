//! JSON exporter for run summaries.

use crate::network::RunSummary;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// One run in an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub index: usize,
    pub start_secs: f64,
    pub end_secs: f64,
    pub steps: u64,
    pub entity_updates: u64,
    pub stopped: bool,
    pub wall_time_secs: f64,
}

impl RunRecord {
    pub fn new(index: usize, summary: &RunSummary) -> Self {
        Self {
            index,
            start_secs: summary.start.as_secs(),
            end_secs: summary.end.as_secs(),
            steps: summary.steps,
            entity_updates: summary.entity_updates,
            stopped: summary.stopped,
            wall_time_secs: summary.wall_time_secs,
        }
    }
}

/// Complete export of a batch of runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunExport {
    /// Free-form label
    pub label: String,

    /// Entities alive at the start of the batch
    pub entity_count: usize,

    /// All runs, in order
    pub runs: Vec<RunRecord>,

    /// Simulated time reached by the last run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_time_secs: Option<f64>,
}

impl RunExport {
    /// Creates an empty export.
    pub fn new(label: &str, entity_count: usize) -> Self {
        Self {
            label: label.to_string(),
            entity_count,
            runs: Vec::new(),
            final_time_secs: None,
        }
    }

    /// Adds a run.
    pub fn add_run(&mut self, summary: &RunSummary) {
        self.runs.push(RunRecord::new(self.runs.len(), summary));
        self.final_time_secs = Some(summary.end.as_secs());
    }

    pub fn total_steps(&self) -> u64 {
        self.runs.iter().map(|r| r.steps).sum()
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
