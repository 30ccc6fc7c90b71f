//! Explicit run context for the magic network.

use crate::error::MagicError;
use crate::magic::MagicNetwork;
use crate::network::{request_global_stop, RunSummary};
use crate::registry::Registry;
use crate::report::Report;
use chronet_env::{check_duration, Quantity};
use std::cell::RefCell;

/// A registry together with the magic network that tracks it.
///
/// The global [`run`](crate::run), [`reinit`](crate::reinit) and
/// [`stop`](crate::stop) functions are shorthands for a default context
/// built around [`Registry::global`]. Code that wants isolation (tests,
/// several independent simulations in one thread) creates its own.
#[derive(Debug)]
pub struct MagicContext {
    network: MagicNetwork,
}

impl MagicContext {
    /// Creates a context with a fresh, empty registry.
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Creates a context tracking an existing registry.
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            network: MagicNetwork::new(registry),
        }
    }

    pub fn registry(&self) -> &Registry {
        self.network.registry()
    }

    pub fn network(&self) -> &MagicNetwork {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut MagicNetwork {
        &mut self.network
    }

    /// Validates the time arguments, then runs every live entity.
    pub fn run(
        &mut self,
        duration: Quantity,
        report: Report,
        report_period: Quantity,
    ) -> Result<RunSummary, MagicError> {
        let duration = check_duration("duration", duration)?;
        let report_period = check_duration("report_period", report_period)?;
        self.network.run(duration, report, report_period)
    }

    pub fn reinit(&mut self) -> Result<(), MagicError> {
        self.network.reinit()
    }

    /// Same as the global [`stop`](crate::stop): halts every network.
    pub fn stop(&self) {
        request_global_stop();
    }
}

impl Default for MagicContext {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static DEFAULT_CONTEXT: RefCell<MagicContext> =
        RefCell::new(MagicContext::with_registry(Registry::global()));
}

/// Runs `f` with the default context of this thread.
///
/// Fails with [`MagicError::Busy`] when the default context is already in
/// use, e.g. when an entity calls [`run`](crate::run) from its own update.
pub fn with_default_context<R>(f: impl FnOnce(&mut MagicContext) -> R) -> Result<R, MagicError> {
    DEFAULT_CONTEXT.with(|cell| {
        let mut ctx = cell.try_borrow_mut().map_err(|_| MagicError::Busy)?;
        Ok(f(&mut ctx))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::TickCounter;
    use chronet_env::{Clock, SimTime, UnitError};

    #[test]
    fn test_default_context_tracks_global_registry() {
        let same = with_default_context(|ctx| ctx.registry().ptr_eq(&Registry::global())).unwrap();
        assert!(same);
    }

    #[test]
    fn test_nested_default_context_is_busy() {
        let nested = with_default_context(|_| with_default_context(|_| ())).unwrap();
        assert!(matches!(nested, Err(MagicError::Busy)));
    }

    #[test]
    fn test_run_validates_units() {
        let mut ctx = MagicContext::new();

        let err = ctx
            .run(Quantity::volts(1.0), Report::None, Quantity::seconds(60.0))
            .unwrap_err();
        assert!(matches!(err, MagicError::Unit(UnitError::DimensionMismatch { .. })));

        let err = ctx
            .run(Quantity::seconds(1.0), Report::None, Quantity::dimensionless(60.0))
            .unwrap_err();
        match err {
            MagicError::Unit(unit) => assert_eq!(unit.parameter(), "report_period"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_isolated_contexts() {
        let mut first = MagicContext::new();
        let second = MagicContext::new();
        let clock = Clock::shared(SimTime::from_millis(1.0)).unwrap();
        let a = first.registry().spawn(TickCounter::new("a", clock));

        first
            .run(Quantity::millis(2.0), Report::None, Quantity::seconds(60.0))
            .unwrap();
        assert_eq!(a.borrow().updates(), 2);
        assert_eq!(first.network().len(), 1);
        assert!(second.registry().is_empty());
    }
}
