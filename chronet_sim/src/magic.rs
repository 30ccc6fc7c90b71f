//! The automatically tracked network and the global entry points.
//!
//! A [`MagicNetwork`] runs "everything currently alive": before every
//! `run` or `reinit` it throws away its membership and adopts the current
//! snapshot of its [`Registry`]. Its membership cannot be edited by hand.
//!
//! The free functions [`run`], [`reinit`] and [`stop`] front the network
//! of the default [`MagicContext`](crate::MagicContext):
//!
//! ```ignore
//! use chronet_env::Quantity;
//! use chronet_sim::{demo, run, Registry, Report};
//!
//! let _population = demo::spawn_population(&Registry::global(), 4)?;
//! run(Quantity::millis(100.0), Report::Stdout, Quantity::seconds(10.0))?;
//! ```

use crate::context::with_default_context;
use crate::error::MagicError;
use crate::network::{request_global_stop, Network, RunSummary};
use crate::registry::{Registry, RegistryState};
use crate::report::Report;
use chronet_env::{check_duration, EntityRef, Quantity, SimTime};
use tracing::{debug, warn};

/// A network whose membership mirrors a [`Registry`].
///
/// All entities registered (and still alive) when `run` or `reinit` is
/// called take part, in registration order. Entities dropped since the
/// previous call are left out.
///
/// If the registry is fresh (never run, or cleared since), time restarts
/// at zero. Otherwise the network resumes from where the previous run
/// left off, which with several clocks is the time of the clock that is
/// furthest behind.
#[derive(Debug)]
pub struct MagicNetwork {
    network: Network,
    registry: Registry,
}

impl MagicNetwork {
    /// Creates a magic network tracking `registry`.
    pub fn new(registry: Registry) -> Self {
        Self {
            network: Network::new(),
            registry,
        }
    }

    /// Always fails: membership follows the registry.
    pub fn add(&mut self, _entities: &[EntityRef]) -> Result<(), MagicError> {
        Err(MagicError::Protected)
    }

    /// Always fails: membership follows the registry.
    pub fn remove(&mut self, _entities: &[EntityRef]) -> Result<(), MagicError> {
        Err(MagicError::Protected)
    }

    /// Adopts the registry snapshot as the new membership.
    pub(crate) fn resync(&mut self) {
        if self.registry.state() == RegistryState::New {
            self.network.set_t(SimTime::ZERO);
            self.registry.mark_active();
        }
        // Adopted as is; inactive entities are skipped by the stepping loop.
        self.registry.prune();
        let snapshot = self.registry.snapshot();
        debug!(members = snapshot.len(), t = %self.network.t(), "Resynced magic network");
        self.network.replace_members(snapshot);
    }

    /// Runs all live entities for `duration`.
    pub fn run(
        &mut self,
        duration: SimTime,
        report: Report,
        report_period: SimTime,
    ) -> Result<RunSummary, MagicError> {
        self.resync();
        Ok(self.network.run(duration, report, report_period)?)
    }

    /// Reinitialises all live entities and rewinds time to zero.
    pub fn reinit(&mut self) -> Result<(), MagicError> {
        self.resync();
        Ok(self.network.reinit()?)
    }

    /// Asks this network alone to halt at its next step boundary.
    pub fn stop(&self) {
        self.network.stop();
    }

    pub fn t(&self) -> SimTime {
        self.network.t()
    }

    /// Membership as of the last resync.
    pub fn members(&self) -> Vec<EntityRef> {
        self.network.members()
    }

    pub fn len(&self) -> usize {
        self.network.len()
    }

    pub fn is_empty(&self) -> bool {
        self.network.is_empty()
    }

    pub fn is_prepared(&self) -> bool {
        self.network.is_prepared()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Runs every live entity of the default registry for `duration`.
///
/// `duration` and `report_period` must be time quantities. `report_period`
/// is wall-clock time between progress reports.
///
/// The simulation starts at the minimum time of all clocks found. With
/// clocks of dt 3 ms and 5 ms, `run(4 ms)` followed by `run(4 ms)` covers
/// `[0, 4)` and then `[5, 9)`: after the first run the clocks read 6 ms
/// and 5 ms, and the second run starts from the smaller. Run for
/// multiples of the smallest dt to avoid this.
///
/// Every run in progress can be halted with [`stop`].
pub fn run(
    duration: Quantity,
    report: Report,
    report_period: Quantity,
) -> Result<RunSummary, MagicError> {
    let duration = check_duration("duration", duration)?;
    let report_period = check_duration("report_period", report_period)?;
    with_default_context(|ctx| ctx.network_mut().run(duration, report, report_period))?
}

/// [`run`] without progress reporting.
///
/// `duration` must be finite and non-negative.
pub fn run_for(duration: SimTime) -> Result<RunSummary, MagicError> {
    let duration = check_duration("duration", Quantity::seconds(duration.as_secs()))?;
    with_default_context(|ctx| {
        ctx.network_mut()
            .run(duration, Report::None, SimTime::DEFAULT_REPORT_PERIOD)
    })?
}

/// Reinitialises every live entity of the default registry.
pub fn reinit() -> Result<(), MagicError> {
    with_default_context(|ctx| ctx.network_mut().reinit())?
}

/// Stops all running simulations.
///
/// Every network checks this flag between steps, so runs started from
/// explicit [`Network`]s halt as well. A stop issued while nothing is
/// running halts the next run before its first step.
pub fn stop() {
    warn!("Global stop requested");
    request_global_stop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::TickCounter;
    use chronet_env::Clock;
    use std::rc::Rc;

    fn counter(registry: &Registry, name: &str, dt_ms: f64) -> EntityRef {
        let clock = Clock::shared(SimTime::from_millis(dt_ms)).unwrap();
        registry.spawn(TickCounter::new(name, clock))
    }

    fn same_entities(a: &[EntityRef], b: &[EntityRef]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Rc::ptr_eq(x, y))
    }

    #[test]
    fn test_add_and_remove_always_fail() {
        let registry = Registry::new();
        let a = counter(&registry, "a", 1.0);
        let stray = counter(&Registry::new(), "stray", 1.0);
        let mut magic = MagicNetwork::new(registry);

        assert!(magic.add(&[]).unwrap_err().is_protected());
        assert!(magic.add(&[a.clone()]).unwrap_err().is_protected());
        assert!(magic.add(&[a.clone(), stray.clone()]).unwrap_err().is_protected());
        assert!(magic.remove(&[]).unwrap_err().is_protected());
        assert!(magic.remove(&[a]).unwrap_err().is_protected());
        assert!(magic.remove(&[stray]).unwrap_err().is_protected());
        assert!(magic.is_empty());
    }

    #[test]
    fn test_resync_mirrors_registry() {
        let registry = Registry::new();
        let a = counter(&registry, "a", 1.0);
        let b = counter(&registry, "b", 1.0);
        let mut magic = MagicNetwork::new(registry.clone());

        magic.resync();
        assert!(same_entities(&magic.members(), &registry.snapshot()));

        registry.unregister(&a);
        let c = counter(&registry, "c", 1.0);
        magic.resync();
        assert!(same_entities(&magic.members(), &[b, c]));
    }

    #[test]
    fn test_resync_prunes_dropped_entities() {
        let registry = Registry::new();
        let mut magic = MagicNetwork::new(registry.clone());
        for i in 0..10 {
            drop(counter(&registry, &format!("temp_{}", i), 1.0));
        }
        let _live = counter(&registry, "live", 1.0);

        magic.resync();
        assert_eq!(registry.prune(), 0);
        assert_eq!(magic.len(), 1);
    }

    #[test]
    fn test_resync_invalidates_plan() {
        let registry = Registry::new();
        let _a = counter(&registry, "a", 1.0);
        let mut magic = MagicNetwork::new(registry);

        magic
            .run(SimTime::from_millis(2.0), Report::None, SimTime::DEFAULT_REPORT_PERIOD)
            .unwrap();
        assert!(magic.is_prepared());

        magic.resync();
        assert!(!magic.is_prepared());
    }

    #[test]
    fn test_fresh_registry_zeroes_time() {
        let registry = Registry::new();
        let _a = counter(&registry, "a", 1.0);
        let mut magic = MagicNetwork::new(registry.clone());
        magic.network.set_t(SimTime::from_secs(7.0));

        let summary = magic
            .run(SimTime::from_millis(3.0), Report::None, SimTime::DEFAULT_REPORT_PERIOD)
            .unwrap();
        assert_eq!(summary.start, SimTime::ZERO);
        assert_eq!(registry.state(), RegistryState::Active);

        // An active registry keeps the network time
        magic.network.set_t(SimTime::from_secs(7.0));
        magic.resync();
        assert_eq!(magic.t(), SimTime::from_secs(7.0));

        registry.clear_all();
        magic.resync();
        assert_eq!(magic.t(), SimTime::ZERO);
        assert!(magic.is_empty());
    }

    #[test]
    fn test_reinit_resyncs_first() {
        let registry = Registry::new();
        let mut magic = MagicNetwork::new(registry.clone());
        let a = registry.spawn(TickCounter::new(
            "a",
            Clock::shared(SimTime::from_millis(1.0)).unwrap(),
        ));

        magic
            .run(SimTime::from_millis(4.0), Report::None, SimTime::DEFAULT_REPORT_PERIOD)
            .unwrap();
        assert_eq!(a.borrow().updates(), 4);

        let late = counter(&registry, "late", 1.0);
        magic.reinit().unwrap();
        assert_eq!(a.borrow().updates(), 0);
        assert_eq!(magic.t(), SimTime::ZERO);
        assert_eq!(magic.len(), 2);
        assert!(Rc::ptr_eq(&magic.members()[1], &late));
    }
}
