//! Chronet Environment Abstraction Layer
//!
//! This crate defines what the Chronet engine needs to know about the
//! things it simulates, and nothing more:
//! - **Time**: validated [`SimTime`] values and unit-checked [`Quantity`] arguments
//! - **Clocks**: fixed-step [`Clock`]s with integer step indices
//! - **Entities**: the [`Simulable`] trait and the shared [`EntityRef`] handle
//!
//! # Example
//!
//! ```ignore
//! use chronet_env::{Clock, EntityError, SimTime, Simulable};
//! use std::rc::Rc;
//!
//! struct Population { clock: Rc<Clock>, v: f64 }
//!
//! impl Simulable for Population {
//!     fn name(&self) -> &str { "population" }
//!     fn clock(&self) -> Rc<Clock> { Rc::clone(&self.clock) }
//!     fn update(&mut self, _t: SimTime) -> Result<(), EntityError> {
//!         self.v *= 0.99;
//!         Ok(())
//!     }
//! }
//! ```

mod clock;
mod entity;
mod error;
mod units;

pub use clock::{Clock, ClockId, EPSILON};
pub use entity::{EntityKey, EntityRef, Simulable, Slot, WeakEntityRef};
pub use error::{EntityError, EnvError, UnitError};
pub use units::{check_duration, check_time, Dimension, Quantity, SimTime};
