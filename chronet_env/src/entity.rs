//! The simulable entity abstraction.

use crate::clock::Clock;
use crate::error::EntityError;
use crate::units::SimTime;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Position of an entity's update within a single time step.
///
/// Entities sharing a clock are updated in slot order, then by
/// [`Simulable::order`], then in the order they joined the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Start,
    #[default]
    Groups,
    Thresholds,
    Synapses,
    Resets,
    End,
}

impl Slot {
    /// Returns all slots in execution order.
    pub fn all() -> [Slot; 6] {
        [
            Slot::Start,
            Slot::Groups,
            Slot::Thresholds,
            Slot::Synapses,
            Slot::Resets,
            Slot::End,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Slot::Start => "start",
            Slot::Groups => "groups",
            Slot::Thresholds => "thresholds",
            Slot::Synapses => "synapses",
            Slot::Resets => "resets",
            Slot::End => "end",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slot::all()
            .into_iter()
            .find(|slot| slot.name() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown slot: {}", s))
    }
}

/// A unit of stepped simulated-time execution.
///
/// The engine only cares about membership and scheduling: an entity names
/// its clock and schedule position, and is asked to `update` once per tick
/// of that clock.
///
/// # Lifecycle within a run
///
/// ```text
/// before_run()  ->  update(t) for every tick  ->  after_run()
/// ```
///
/// `reinit` is called outside of runs to restore the initial state.
pub trait Simulable {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// The clock that decides when this entity is updated.
    fn clock(&self) -> Rc<Clock>;

    fn when(&self) -> Slot {
        Slot::Groups
    }

    fn order(&self) -> i32 {
        0
    }

    /// Inactive entities stay members but are skipped when stepping.
    fn is_active(&self) -> bool {
        true
    }

    fn before_run(&mut self) {}

    fn after_run(&mut self) {}

    /// Advances the entity by one step of its clock, which currently reads `t`.
    fn update(&mut self, t: SimTime) -> Result<(), EntityError>;

    fn reinit(&mut self) {}
}

/// Shared handle to a simulable entity.
pub type EntityRef = Rc<RefCell<dyn Simulable>>;

/// Non-owning handle to a simulable entity.
pub type WeakEntityRef = Weak<RefCell<dyn Simulable>>;

/// Identity of an entity, derived from its shared allocation.
///
/// Two handles have the same key exactly when they point at the same
/// entity. A key stays unique for as long as any strong or weak handle to
/// the entity exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(usize);

impl EntityKey {
    pub fn of(entity: &EntityRef) -> Self {
        Self(Rc::as_ptr(entity) as *const () as usize)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
