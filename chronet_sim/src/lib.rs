//! Auto-tracking execution of live simulation entities.
//!
//! Entities register themselves in a [`Registry`] when they are spawned and
//! vanish from it when they are dropped. The global [`run`], [`reinit`] and
//! [`stop`] functions operate on "everything currently alive" without the
//! caller ever building an execution graph by hand.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                MagicContext (per thread)             │
//! │  ┌────────────┐  resync  ┌────────────────────────┐  │
//! │  │  Registry  │─────────►│      MagicNetwork      │  │
//! │  │ (weak refs)│          │  ┌──────────────────┐  │  │
//! │  └─────▲──────┘          │  │ Network (t, plan)│  │  │
//! │        │ spawn           │  └──────────────────┘  │  │
//! │        │                 └────────────────────────┘  │
//! └────────┼─────────────────────────────────────────────┘
//!          │
//!    Simulable entities  ◄── Clock (dt, step index)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use chronet_env::Quantity;
//! use chronet_sim::{demo, run, Registry, Report};
//!
//! let population = demo::spawn_population(&Registry::global(), 4)?;
//! let summary = run(Quantity::millis(20.0), Report::None, Quantity::seconds(60.0))?;
//! assert_eq!(summary.end.as_millis().round(), 20.0);
//! ```

mod config;
mod context;
pub mod demo;
mod error;
mod exporter;
mod magic;
mod network;
mod registry;
mod report;

pub use config::RunConfig;
pub use context::{with_default_context, MagicContext};
pub use error::{ConfigError, MagicError, NetworkError};
pub use exporter::{RunExport, RunRecord};
pub use magic::{reinit, run, run_for, stop, MagicNetwork};
pub use network::{globally_stopped, request_global_stop, Network, RunSummary, StopHandle};
pub use registry::{Registry, RegistryState};
pub use report::{Report, ReportCallback, ReportTarget};
