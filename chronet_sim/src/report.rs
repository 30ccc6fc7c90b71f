//! Progress reporting during a run.

use chronet_env::SimTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::time::{Duration, Instant};

/// Progress callback: `(elapsed wall-clock seconds, fraction complete in [0, 1])`.
pub type ReportCallback = Box<dyn FnMut(f64, f64)>;

/// How to report the progress of a run.
#[derive(Default)]
pub enum Report {
    /// No progress output.
    #[default]
    None,
    /// Text lines on stdout.
    Stdout,
    /// Text lines on stderr.
    Stderr,
    /// A progress bar redrawn in place on stderr.
    Graphical,
    /// A user callback.
    Callback(ReportCallback),
}

impl Report {
    /// Wraps a closure as a callback report.
    pub fn callback(f: impl FnMut(f64, f64) + 'static) -> Self {
        Report::Callback(Box::new(f))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Report::None)
    }
}

impl fmt::Debug for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::None => write!(f, "None"),
            Report::Stdout => write!(f, "Stdout"),
            Report::Stderr => write!(f, "Stderr"),
            Report::Graphical => write!(f, "Graphical"),
            Report::Callback(_) => write!(f, "Callback(..)"),
        }
    }
}

/// Serializable subset of [`Report`], used by configuration and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportTarget {
    #[default]
    None,
    Stdout,
    Stderr,
    Graphical,
}

impl ReportTarget {
    pub fn name(&self) -> &'static str {
        match self {
            ReportTarget::None => "none",
            ReportTarget::Stdout => "stdout",
            ReportTarget::Stderr => "stderr",
            ReportTarget::Graphical => "graphical",
        }
    }
}

impl From<ReportTarget> for Report {
    fn from(target: ReportTarget) -> Report {
        match target {
            ReportTarget::None => Report::None,
            ReportTarget::Stdout => Report::Stdout,
            ReportTarget::Stderr => Report::Stderr,
            ReportTarget::Graphical => Report::Graphical,
        }
    }
}

impl fmt::Display for ReportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ReportTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(ReportTarget::None),
            "stdout" => Ok(ReportTarget::Stdout),
            "stderr" => Ok(ReportTarget::Stderr),
            "graphical" | "bar" => Ok(ReportTarget::Graphical),
            _ => Err(format!("Unknown report target: {}", s)),
        }
    }
}

const BAR_WIDTH: usize = 40;

/// Drives a [`Report`] over the course of one run.
pub(crate) struct Reporter {
    report: Report,
    period: Duration,
    start: SimTime,
    duration: SimTime,
    started_at: Instant,
    last_report: Instant,
}

impl Reporter {
    pub(crate) fn new(report: Report, period: SimTime, start: SimTime, duration: SimTime) -> Self {
        let now = Instant::now();
        Self {
            report,
            period: Duration::from_secs_f64(period.as_secs().max(0.0)),
            start,
            duration,
            started_at: now,
            last_report: now,
        }
    }

    /// Reports 0% at the start of the run.
    pub(crate) fn begin(&mut self) {
        self.emit(0.0);
    }

    /// Reports if at least one period of wall-clock time has passed.
    pub(crate) fn maybe_report(&mut self, now: SimTime) {
        if self.report.is_none() || self.last_report.elapsed() < self.period {
            return;
        }
        self.last_report = Instant::now();
        let complete = self.fraction(now);
        self.emit(complete);
    }

    /// Final report once the run is over.
    pub(crate) fn finish(&mut self, end: SimTime) {
        let complete = self.fraction(end);
        self.emit(complete);
        if matches!(self.report, Report::Graphical) {
            eprintln!();
        }
    }

    fn fraction(&self, now: SimTime) -> f64 {
        if self.duration.as_secs() <= 0.0 {
            return 1.0;
        }
        ((now - self.start) / self.duration).clamp(0.0, 1.0)
    }

    fn emit(&mut self, complete: f64) {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if let Report::Callback(callback) = &mut self.report {
            callback(elapsed, complete);
            return;
        }
        match self.report {
            Report::None | Report::Callback(_) => {}
            Report::Stdout => println!("{}", self.progress_line(elapsed, complete)),
            Report::Stderr => eprintln!("{}", self.progress_line(elapsed, complete)),
            Report::Graphical => {
                let filled = (complete * BAR_WIDTH as f64).round() as usize;
                let mut stderr = std::io::stderr();
                let _ = write!(
                    stderr,
                    "\r[{}{}] {:>3.0}%",
                    "#".repeat(filled),
                    " ".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)),
                    complete * 100.0
                );
                let _ = stderr.flush();
            }
        }
    }

    fn progress_line(&self, elapsed: f64, complete: f64) -> String {
        let simulated = self.duration * complete;
        if complete <= 0.0 {
            return format!("{} simulated (0%), estimated time remaining unknown", simulated);
        }
        let remaining = elapsed / complete * (1.0 - complete);
        format!(
            "{} simulated ({:.0}%), estimated {:.0} s remaining.",
            simulated,
            complete * 100.0,
            remaining
        )
    }
}
