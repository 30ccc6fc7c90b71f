//! Logical clocks that drive entity stepping.

use crate::error::EnvError;
use crate::units::SimTime;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Tolerance, in steps, when snapping interval bounds onto the clock grid.
pub const EPSILON: f64 = 1e-9;

static NEXT_CLOCK_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique clock identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockId(u64);

impl ClockId {
    fn next() -> Self {
        Self(NEXT_CLOCK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ClockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clock_{}", self.0)
    }
}

/// A fixed-step logical clock.
///
/// Time is kept as an integer step index so that repeated ticking does not
/// accumulate rounding error: `t = i * dt`. During a run the clock also
/// holds the index at which it stops, see [`Clock::set_interval`].
///
/// Several entities can share one clock (via `Rc<Clock>`); they are then
/// stepped together.
#[derive(Debug)]
pub struct Clock {
    id: ClockId,
    dt: SimTime,
    i: Cell<u64>,
    i_end: Cell<u64>,
}

impl Clock {
    /// Creates a clock at t = 0 with the given step.
    pub fn new(dt: SimTime) -> Result<Self, EnvError> {
        let secs = dt.as_secs();
        if !secs.is_finite() || secs <= 0.0 {
            return Err(EnvError::InvalidDt(secs));
        }
        Ok(Self {
            id: ClockId::next(),
            dt,
            i: Cell::new(0),
            i_end: Cell::new(0),
        })
    }

    /// Creates an Rc-wrapped clock for sharing between entities.
    pub fn shared(dt: SimTime) -> Result<Rc<Self>, EnvError> {
        Self::new(dt).map(Rc::new)
    }

    pub fn id(&self) -> ClockId {
        self.id
    }

    pub fn dt(&self) -> SimTime {
        self.dt
    }

    /// Current time of this clock.
    pub fn t(&self) -> SimTime {
        self.dt * self.i.get() as f64
    }

    /// Time at which the current run interval ends.
    pub fn t_end(&self) -> SimTime {
        self.dt * self.i_end.get() as f64
    }

    pub fn step_index(&self) -> u64 {
        self.i.get()
    }

    /// Positions the clock for a run over `[start, end)`.
    ///
    /// Both bounds are rounded up to the next multiple of `dt`, so a clock
    /// whose current time already lies past `start` is moved to the first
    /// grid point at or after `start`.
    pub fn set_interval(&self, start: SimTime, end: SimTime) {
        self.i.set(grid_index(start, self.dt));
        self.i_end.set(grid_index(end, self.dt));
    }

    /// Whether the clock has steps left in the current interval.
    pub fn running(&self) -> bool {
        self.i.get() < self.i_end.get()
    }

    /// Advances the clock by one step.
    pub fn tick(&self) {
        self.i.set(self.i.get() + 1);
    }

    /// Rewinds the clock to t = 0.
    pub fn reinit(&self) {
        self.i.set(0);
        self.i_end.set(0);
    }
}

fn grid_index(t: SimTime, dt: SimTime) -> u64 {
    let steps = t / dt;
    if steps <= 0.0 {
        return 0;
    }
    (steps - EPSILON).ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clock_rejects_bad_dt() {
        assert!(matches!(
            Clock::new(SimTime::ZERO),
            Err(EnvError::InvalidDt(_))
        ));
        assert!(Clock::new(SimTime::from_secs(-1.0)).is_err());
        assert!(Clock::new(SimTime::from_secs(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_clock_ids_are_unique() {
        let a = Clock::new(SimTime::from_millis(1.0)).unwrap();
        let b = Clock::new(SimTime::from_millis(1.0)).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_interval_rounds_up_to_grid() {
        let clock = Clock::new(SimTime::from_secs(3.0)).unwrap();

        clock.set_interval(SimTime::ZERO, SimTime::from_secs(4.0));
        assert_eq!(clock.step_index(), 0);
        assert_relative_eq!(clock.t_end().as_secs(), 6.0);

        clock.set_interval(SimTime::from_secs(5.0), SimTime::from_secs(9.0));
        assert_relative_eq!(clock.t().as_secs(), 6.0);
        assert_relative_eq!(clock.t_end().as_secs(), 9.0);
    }

    #[test]
    fn test_interval_tolerates_float_noise() {
        let clock = Clock::new(SimTime::from_millis(3.0)).unwrap();
        // 9 ms / 3 ms is not exactly 3.0 in binary floating point
        clock.set_interval(SimTime::ZERO, SimTime::from_millis(9.0));
        let mut ticks = 0;
        while clock.running() {
            clock.tick();
            ticks += 1;
        }
        assert_eq!(ticks, 3);
    }

    #[test]
    fn test_tick_until_not_running() {
        let clock = Clock::new(SimTime::from_secs(3.0)).unwrap();
        clock.set_interval(SimTime::ZERO, SimTime::from_secs(4.0));

        let mut ticks = 0;
        while clock.running() {
            clock.tick();
            ticks += 1;
        }
        assert_eq!(ticks, 2);
        assert_relative_eq!(clock.t().as_secs(), 6.0);

        clock.reinit();
        assert_eq!(clock.t(), SimTime::ZERO);
        assert!(!clock.running());
    }
}
