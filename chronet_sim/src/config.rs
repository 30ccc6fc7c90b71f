//! Run configuration.

use crate::error::ConfigError;
use crate::report::ReportTarget;
use chronet_env::Quantity;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a batch of runs.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Simulated duration of each run in seconds
    pub duration_secs: f64,

    /// Wall-clock seconds between progress reports
    pub report_period_secs: f64,

    /// Where progress reports go
    pub report: ReportTarget,

    /// Number of demo entities to spawn
    pub entities: usize,

    /// Number of consecutive runs
    pub runs: u32,

    /// Write a JSON export of the runs here
    pub export_path: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration_secs: 1.0,
            report_period_secs: 60.0,
            report: ReportTarget::None,
            entities: 4,
            runs: 1,
            export_path: None,
        }
    }
}

impl RunConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn duration(&self) -> Quantity {
        Quantity::seconds(self.duration_secs)
    }

    pub fn report_period(&self) -> Quantity {
        Quantity::seconds(self.report_period_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.report_period_secs, 60.0);
        assert_eq!(config.report, ReportTarget::None);
        assert!(config.duration().is_time());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RunConfig::from_json_str(r#"{ "duration_secs": 0.25, "report": "stderr" }"#)
            .unwrap();
        assert_eq!(config.duration_secs, 0.25);
        assert_eq!(config.report, ReportTarget::Stderr);
        assert_eq!(config.entities, 4);
        assert_eq!(config.runs, 1);
    }

    #[test]
    fn test_invalid_json() {
        let err = RunConfig::from_json_str(r#"{ "report": "tkinter" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "runs": 3, "export_path": "out.json" }}"#).unwrap();

        let config = RunConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.runs, 3);
        assert_eq!(config.export_path.as_deref(), Some("out.json"));

        let missing = RunConfig::from_json_file(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
