//! Demo entities used by the CLI and the test suite.

use crate::registry::Registry;
use chronet_env::{Clock, EntityError, EnvError, SimTime, Simulable, Slot};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared log of `(entity name, update time)` pairs.
pub type UpdateLog = Rc<RefCell<Vec<(String, SimTime)>>>;

/// An entity that counts its updates.
#[derive(Debug)]
pub struct TickCounter {
    name: String,
    clock: Rc<Clock>,
    slot: Slot,
    order: i32,
    active: bool,
    updates: u64,
    last_update: Option<SimTime>,
    runs: u32,
    log: Option<UpdateLog>,
}

impl TickCounter {
    pub fn new(name: impl Into<String>, clock: Rc<Clock>) -> Self {
        Self {
            name: name.into(),
            clock,
            slot: Slot::default(),
            order: 0,
            active: true,
            updates: 0,
            last_update: None,
            runs: 0,
            log: None,
        }
    }

    /// Sets the schedule slot.
    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.slot = slot;
        self
    }

    /// Sets the order within the slot.
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Appends every update to `log`.
    pub fn with_log(mut self, log: UpdateLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn last_update(&self) -> Option<SimTime> {
        self.last_update
    }

    /// Number of completed runs this entity took part in.
    pub fn runs(&self) -> u32 {
        self.runs
    }
}

impl Simulable for TickCounter {
    fn name(&self) -> &str {
        &self.name
    }

    fn clock(&self) -> Rc<Clock> {
        Rc::clone(&self.clock)
    }

    fn when(&self) -> Slot {
        self.slot
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn after_run(&mut self) {
        self.runs += 1;
    }

    fn update(&mut self, t: SimTime) -> Result<(), EntityError> {
        self.updates += 1;
        self.last_update = Some(t);
        if let Some(log) = &self.log {
            log.borrow_mut().push((self.name.clone(), t));
        }
        Ok(())
    }

    fn reinit(&mut self) {
        self.updates = 0;
        self.last_update = None;
    }
}

/// Step sizes of the two demo clocks. Their ratio makes repeated short
/// runs drift apart, which the CLI output shows.
pub const DEMO_DTS_MS: [f64; 2] = [3.0, 5.0];

/// Spawns `count` counters into `registry`, alternating between two
/// shared clocks. The caller keeps the returned handles alive.
pub fn spawn_population(
    registry: &Registry,
    count: usize,
) -> Result<Vec<Rc<RefCell<TickCounter>>>, EnvError> {
    let clocks = [
        Clock::shared(SimTime::from_millis(DEMO_DTS_MS[0]))?,
        Clock::shared(SimTime::from_millis(DEMO_DTS_MS[1]))?,
    ];

    let population = (0..count)
        .map(|i| {
            let clock = Rc::clone(&clocks[i % clocks.len()]);
            registry.spawn(TickCounter::new(format!("counter_{}", i), clock))
        })
        .collect();

    Ok(population)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_population_alternates_clocks() {
        let registry = Registry::new();
        let population = spawn_population(&registry, 4).unwrap();

        assert_eq!(registry.len(), 4);
        let c0 = population[0].borrow().clock();
        let c1 = population[1].borrow().clock();
        let c2 = population[2].borrow().clock();
        assert_ne!(c0.id(), c1.id());
        assert_eq!(c0.id(), c2.id());
        assert_eq!(population[3].borrow().name(), "counter_3");
    }

    #[test]
    fn test_counter_update_and_reinit() {
        let clock = Clock::shared(SimTime::from_millis(1.0)).unwrap();
        let log = UpdateLog::default();
        let mut counter = TickCounter::new("c", clock).with_log(Rc::clone(&log));

        counter.update(SimTime::from_millis(2.0)).unwrap();
        assert_eq!(counter.updates(), 1);
        assert_eq!(counter.last_update(), Some(SimTime::from_millis(2.0)));
        assert_eq!(log.borrow().len(), 1);

        counter.reinit();
        assert_eq!(counter.updates(), 0);
        assert_eq!(counter.last_update(), None);
    }
}
