//! Generic execution container with clock-aligned stepping.
//!
//! A [`Network`] holds an ordered list of entities and a logical time `t`.
//! [`Network::run`] advances every member for a given duration of simulated
//! time, stepping the entities whose clocks are furthest behind first.

use crate::error::NetworkError;
use crate::report::{Report, Reporter};
use chronet_env::{
    Clock, ClockId, EntityKey, EntityRef, SimTime, Simulable, Slot, WeakEntityRef, EPSILON,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefMut};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Halt request shared by every network in the process.
static GLOBALLY_STOPPED: AtomicBool = AtomicBool::new(false);

/// Asks every running network to halt at its next step boundary.
pub fn request_global_stop() {
    GLOBALLY_STOPPED.store(true, Ordering::SeqCst);
}

/// Whether a global halt has been requested and not yet consumed by a run.
pub fn globally_stopped() -> bool {
    GLOBALLY_STOPPED.load(Ordering::SeqCst)
}

fn clear_global_stop() {
    GLOBALLY_STOPPED.store(false, Ordering::SeqCst);
}

thread_local! {
    /// Number of `Network::run` calls in progress on this thread.
    static RUN_DEPTH: Cell<usize> = Cell::new(0);
}

/// Tracks one run in progress.
///
/// Dropping it clears the network's own stop request. The global request
/// is cleared only when the outermost run on this thread exits, so a stop
/// seen by a nested run still halts every enclosing run.
struct RunGuard {
    stop_requested: Rc<Cell<bool>>,
}

impl RunGuard {
    fn enter(stop_requested: &Rc<Cell<bool>>) -> Self {
        RUN_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self {
            stop_requested: Rc::clone(stop_requested),
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.stop_requested.set(false);
        let outermost = RUN_DEPTH.with(|depth| {
            let remaining = depth.get().saturating_sub(1);
            depth.set(remaining);
            remaining == 0
        });
        if outermost {
            clear_global_stop();
        }
    }
}

/// Outcome of a single [`Network::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Network time when the run started
    pub start: SimTime,

    /// Network time when the run ended
    pub end: SimTime,

    /// Number of time steps executed
    pub steps: u64,

    /// Total entity updates across all steps
    pub entity_updates: u64,

    /// Whether the run was cut short by a stop request
    pub stopped: bool,

    /// Wall-clock duration of the run in seconds
    pub wall_time_secs: f64,
}

struct Member {
    key: EntityKey,
    entity: WeakEntityRef,
}

struct PlannedEntity {
    entity: WeakEntityRef,
    clock: ClockId,
}

/// Cached execution order and clock set.
struct PreparedPlan {
    entities: Vec<PlannedEntity>,
    clocks: Vec<Rc<Clock>>,
}

/// Ordered collection of entities run together.
///
/// Members are held by non-owning reference; the caller owns the
/// entities. Members that have been dropped are skipped.
pub struct Network {
    members: Vec<Member>,
    t: SimTime,
    plan: Option<PreparedPlan>,
    stop_requested: Rc<Cell<bool>>,
}

impl Network {
    /// Creates an empty network at t = 0.
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
            t: SimTime::ZERO,
            plan: None,
            stop_requested: Rc::new(Cell::new(false)),
        }
    }

    /// Adds entities that are not already members.
    ///
    /// Members are held by weak reference: the caller must keep the
    /// entities alive for them to take part in a run.
    pub fn add(&mut self, entities: &[EntityRef]) {
        for entity in entities {
            let key = EntityKey::of(entity);
            if self.members.iter().any(|m| m.key == key) {
                continue;
            }
            self.members.push(Member {
                key,
                entity: Rc::downgrade(entity),
            });
        }
        self.invalidate();
    }

    /// Removes the given entities; unknown ones are ignored.
    pub fn remove(&mut self, entities: &[EntityRef]) {
        let keys: Vec<EntityKey> = entities.iter().map(EntityKey::of).collect();
        self.members.retain(|m| !keys.contains(&m.key));
        self.invalidate();
    }

    /// Replaces the membership with `entities`, verbatim and in order.
    pub(crate) fn replace_members(&mut self, entities: Vec<EntityRef>) {
        self.members = entities
            .iter()
            .map(|entity| Member {
                key: EntityKey::of(entity),
                entity: Rc::downgrade(entity),
            })
            .collect();
        self.invalidate();
    }

    /// Live members in membership order.
    pub fn members(&self) -> Vec<EntityRef> {
        self.members
            .iter()
            .filter_map(|m| m.entity.upgrade())
            .collect()
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.entity.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current network time.
    pub fn t(&self) -> SimTime {
        self.t
    }

    /// Sets the time the next run starts from.
    pub fn set_t(&mut self, t: SimTime) {
        self.t = t;
    }

    /// Whether a prepared execution plan is cached.
    pub fn is_prepared(&self) -> bool {
        self.plan.is_some()
    }

    /// Drops the cached execution plan.
    pub fn invalidate(&mut self) {
        self.plan = None;
    }

    /// Asks this network to halt at its next step boundary.
    pub fn stop(&self) {
        self.stop_requested.set(true);
    }

    /// A handle that stops this network; usable from inside entity updates.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Rc::clone(&self.stop_requested))
    }

    /// Builds the execution plan: entities ordered by `(slot, order,
    /// membership index)` and the distinct clocks they use.
    ///
    /// A cached plan is reused unless one of its entities has been dropped.
    pub fn prepare(&mut self) -> Result<(), NetworkError> {
        if let Some(plan) = &self.plan {
            if plan.entities.iter().all(|p| p.entity.strong_count() > 0) {
                return Ok(());
            }
            trace!("Prepared plan references dropped entities, rebuilding");
        }

        let mut ordered: Vec<(Slot, i32, usize, PlannedEntity)> = Vec::new();
        let mut clocks: IndexMap<ClockId, Rc<Clock>> = IndexMap::new();

        for (index, member) in self.members.iter().enumerate() {
            let Some(entity) = member.entity.upgrade() else {
                continue;
            };
            let guard = entity
                .try_borrow()
                .map_err(|_| NetworkError::EntityBusy { key: member.key })?;
            let clock = guard.clock();
            let planned = PlannedEntity {
                entity: Rc::downgrade(&entity),
                clock: clock.id(),
            };
            ordered.push((guard.when(), guard.order(), index, planned));
            clocks.entry(clock.id()).or_insert(clock);
        }
        ordered.sort_by_key(|(when, order, index, _)| (*when, *order, *index));

        debug!(
            entities = ordered.len(),
            clocks = clocks.len(),
            "Prepared network"
        );

        self.plan = Some(PreparedPlan {
            entities: ordered.into_iter().map(|(_, _, _, p)| p).collect(),
            clocks: clocks.into_values().collect(),
        });
        Ok(())
    }

    /// Runs every member for `duration` of simulated time.
    ///
    /// Each clock is positioned on `[t, t + duration)`. Steps repeatedly
    /// pick the clocks with the smallest current time and update the active
    /// entities on them, until that time reaches the end of the interval or
    /// a stop is requested. Afterwards `t` is the smallest clock time, so a
    /// following run resumes from the clock that is furthest behind.
    ///
    /// Every entity that got `before_run` gets `after_run`, also when the
    /// run fails.
    pub fn run(
        &mut self,
        duration: SimTime,
        report: Report,
        report_period: SimTime,
    ) -> Result<RunSummary, NetworkError> {
        let _guard = RunGuard::enter(&self.stop_requested);
        self.prepare()?;
        let (entities, clocks) = self.upgrade_plan();

        let start = self.t;
        let end = start + duration;
        let wall_start = Instant::now();

        for clock in &clocks {
            clock.set_interval(start, end);
        }

        let mut outcome = Ok(());
        let mut started = 0;
        for (entity, _) in &entities {
            match borrow_mut(entity) {
                Ok(mut entity) => entity.before_run(),
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
            started += 1;
        }

        info!(%start, %end, entities = entities.len(), "Starting run");
        let mut reporter = Reporter::new(report, report_period, start, duration);
        let mut steps = 0u64;
        let mut entity_updates = 0u64;
        let mut stopped = false;

        if outcome.is_ok() {
            reporter.begin();
            outcome = loop {
                let Some(now) = clocks.iter().map(|c| c.t()).reduce(SimTime::min) else {
                    break Ok(());
                };
                let current: Vec<&Rc<Clock>> = clocks
                    .iter()
                    .filter(|c| ((c.t() - now) / c.dt()).abs() < EPSILON)
                    .collect();
                if !current.iter().any(|c| c.running()) {
                    break Ok(());
                }
                if self.stop_requested.get() || globally_stopped() {
                    warn!(t = %now, "Run stopped");
                    stopped = true;
                    break Ok(());
                }

                let current_ids: Vec<ClockId> = current.iter().map(|c| c.id()).collect();
                match step_entities(&entities, &current_ids, now) {
                    Ok(updated) => entity_updates += updated,
                    Err(err) => break Err(err),
                }
                for clock in &current {
                    clock.tick();
                }
                steps += 1;
                reporter.maybe_report(now);
            };
        }

        self.t = clocks.iter().map(|c| c.t()).reduce(SimTime::min).unwrap_or(end);

        for (entity, _) in entities.iter().take(started) {
            match borrow_mut(entity) {
                Ok(mut entity) => entity.after_run(),
                Err(err) => {
                    if outcome.is_ok() {
                        outcome = Err(err);
                    }
                }
            }
        }
        outcome?;
        reporter.finish(self.t);

        let summary = RunSummary {
            start,
            end: self.t,
            steps,
            entity_updates,
            stopped,
            wall_time_secs: wall_start.elapsed().as_secs_f64(),
        };
        info!(
            end = %summary.end,
            steps = summary.steps,
            stopped = summary.stopped,
            "Run finished"
        );
        Ok(summary)
    }

    /// Reinitialises every member and rewinds all clocks and `t` to zero.
    pub fn reinit(&mut self) -> Result<(), NetworkError> {
        self.prepare()?;
        let (entities, clocks) = self.upgrade_plan();

        for (entity, _) in &entities {
            borrow_mut(entity)?.reinit();
        }
        for clock in &clocks {
            clock.reinit();
        }
        self.t = SimTime::ZERO;
        debug!(entities = entities.len(), "Network reinitialised");
        Ok(())
    }

    /// Strong handles for the run. Holding them keeps members alive for
    /// the duration of the run.
    fn upgrade_plan(&self) -> (Vec<(EntityRef, ClockId)>, Vec<Rc<Clock>>) {
        match &self.plan {
            Some(plan) => (
                plan.entities
                    .iter()
                    .filter_map(|p| p.entity.upgrade().map(|e| (e, p.clock)))
                    .collect(),
                plan.clocks.clone(),
            ),
            None => (Vec::new(), Vec::new()),
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("members", &self.members.len())
            .field("t", &self.t)
            .field("prepared", &self.plan.is_some())
            .finish()
    }
}

/// Stops one specific [`Network`].
#[derive(Debug, Clone)]
pub struct StopHandle(Rc<Cell<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.set(true);
    }
}

fn borrow_mut(entity: &EntityRef) -> Result<RefMut<'_, dyn Simulable + 'static>, NetworkError> {
    entity.try_borrow_mut().map_err(|_| NetworkError::EntityBusy {
        key: EntityKey::of(entity),
    })
}

fn step_entities(
    entities: &[(EntityRef, ClockId)],
    current: &[ClockId],
    now: SimTime,
) -> Result<u64, NetworkError> {
    let mut updated = 0;
    for (entity, clock) in entities {
        if !current.contains(clock) {
            continue;
        }
        let mut entity = borrow_mut(entity)?;
        if !entity.is_active() {
            continue;
        }
        entity.update(now)?;
        updated += 1;
    }
    Ok(updated)
}
