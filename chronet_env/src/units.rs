//! Physical quantities and time validation.
//!
//! Simulation entry points take time arguments as [`Quantity`] values so
//! that a voltage or a bare number passed where a duration is expected is
//! rejected before any simulation state is touched. Once validated, times
//! travel through the engine as [`SimTime`].

use crate::error::UnitError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Sub};

/// Exponents over the seven SI base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimension {
    pub length: i8,
    pub mass: i8,
    pub time: i8,
    pub current: i8,
    pub temperature: i8,
    pub amount: i8,
    pub luminosity: i8,
}

impl Dimension {
    /// A pure number.
    pub const DIMENSIONLESS: Self = Self {
        length: 0,
        mass: 0,
        time: 0,
        current: 0,
        temperature: 0,
        amount: 0,
        luminosity: 0,
    };

    /// Seconds.
    pub const TIME: Self = Self {
        time: 1,
        ..Self::DIMENSIONLESS
    };

    /// Metres.
    pub const LENGTH: Self = Self {
        length: 1,
        ..Self::DIMENSIONLESS
    };

    /// Volts (kg m^2 s^-3 A^-1).
    pub const VOLTAGE: Self = Self {
        length: 2,
        mass: 1,
        time: -3,
        current: -1,
        ..Self::DIMENSIONLESS
    };

    /// Returns true if every exponent is zero.
    pub fn is_dimensionless(&self) -> bool {
        *self == Self::DIMENSIONLESS
    }

    fn exponents(&self) -> [(&'static str, i8); 7] {
        [
            ("m", self.length),
            ("kg", self.mass),
            ("s", self.time),
            ("A", self.current),
            ("K", self.temperature),
            ("mol", self.amount),
            ("cd", self.luminosity),
        ]
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "1");
        }
        let parts: Vec<String> = self
            .exponents()
            .iter()
            .filter(|(_, exp)| *exp != 0)
            .map(|(unit, exp)| match exp {
                1 => unit.to_string(),
                _ => format!("{}^{}", unit, exp),
            })
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

/// A value with physical dimensions, in SI base units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub dim: Dimension,
}

impl Quantity {
    /// Creates a quantity from a value in SI base units.
    pub fn new(value: f64, dim: Dimension) -> Self {
        Self { value, dim }
    }

    pub fn seconds(value: f64) -> Self {
        Self::new(value, Dimension::TIME)
    }

    pub fn millis(value: f64) -> Self {
        Self::new(value * 1e-3, Dimension::TIME)
    }

    pub fn micros(value: f64) -> Self {
        Self::new(value * 1e-6, Dimension::TIME)
    }

    pub fn dimensionless(value: f64) -> Self {
        Self::new(value, Dimension::DIMENSIONLESS)
    }

    pub fn volts(value: f64) -> Self {
        Self::new(value, Dimension::VOLTAGE)
    }

    pub fn metres(value: f64) -> Self {
        Self::new(value, Dimension::LENGTH)
    }

    /// Returns true if this quantity has dimensions of time.
    pub fn is_time(&self) -> bool {
        self.dim == Dimension::TIME
    }
}

impl Mul<f64> for Quantity {
    type Output = Quantity;

    fn mul(self, rhs: f64) -> Quantity {
        Quantity::new(self.value * rhs, self.dim)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dim.is_dimensionless() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {}", self.value, self.dim)
        }
    }
}

/// A validated simulated time, in seconds.
///
/// Simulated time is advisory logical time and has no relation to the
/// wall clock.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(f64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0.0);

    /// Default wall-clock interval between progress reports.
    pub const DEFAULT_REPORT_PERIOD: SimTime = SimTime(60.0);

    /// Creates a time from seconds. The value is expected to be finite.
    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    pub fn from_millis(millis: f64) -> Self {
        Self(millis * 1e-3)
    }

    pub fn as_secs(self) -> f64 {
        self.0
    }

    pub fn as_millis(self) -> f64 {
        self.0 * 1e3
    }

    /// Returns the smaller of two times.
    pub fn min(self, other: SimTime) -> SimTime {
        if other.0 < self.0 {
            other
        } else {
            self
        }
    }

    /// Returns the larger of two times.
    pub fn max(self, other: SimTime) -> SimTime {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        self.0 += rhs.0;
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 - rhs.0)
    }
}

impl Mul<f64> for SimTime {
    type Output = SimTime;

    fn mul(self, rhs: f64) -> SimTime {
        SimTime(self.0 * rhs)
    }
}

/// Ratio of two times.
impl Div for SimTime {
    type Output = f64;

    fn div(self, rhs: SimTime) -> f64 {
        self.0 / rhs.0
    }
}

impl From<SimTime> for Quantity {
    fn from(t: SimTime) -> Quantity {
        Quantity::seconds(t.0)
    }
}

impl TryFrom<Quantity> for SimTime {
    type Error = UnitError;

    fn try_from(q: Quantity) -> Result<Self, Self::Error> {
        check_time("time", q)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 != 0.0 && self.0.abs() < 1.0 {
            write!(f, "{} ms", self.as_millis())
        } else {
            write!(f, "{} s", self.0)
        }
    }
}

/// Validates that `q` is a finite time quantity.
///
/// `name` identifies the parameter in the returned error.
pub fn check_time(name: &str, q: Quantity) -> Result<SimTime, UnitError> {
    if !q.is_time() {
        return Err(UnitError::DimensionMismatch {
            name: name.to_string(),
            expected: Dimension::TIME,
            found: q.dim,
        });
    }
    if !q.value.is_finite() {
        return Err(UnitError::NonFinite {
            name: name.to_string(),
            value: q.value,
        });
    }
    Ok(SimTime(q.value))
}

/// Like [`check_time`], but also rejects negative values.
pub fn check_duration(name: &str, q: Quantity) -> Result<SimTime, UnitError> {
    let t = check_time(name, q)?;
    if t.0 < 0.0 {
        return Err(UnitError::Negative {
            name: name.to_string(),
            value: t.0,
        });
    }
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_millis_converts_to_seconds() {
        let t = check_time("t", Quantity::millis(250.0)).unwrap();
        assert_relative_eq!(t.as_secs(), 0.25);
        assert_relative_eq!(t.as_millis(), 250.0);
    }

    #[test]
    fn test_check_time_rejects_other_dimensions() {
        let err = check_time("duration", Quantity::volts(1.0)).unwrap_err();
        assert!(matches!(
            err,
            UnitError::DimensionMismatch { found, .. } if found == Dimension::VOLTAGE
        ));

        let err = check_time("duration", Quantity::dimensionless(10.0)).unwrap_err();
        assert_eq!(err.parameter(), "duration");
    }

    #[test]
    fn test_check_time_rejects_non_finite() {
        let err = check_time("report_period", Quantity::seconds(f64::NAN)).unwrap_err();
        assert!(matches!(err, UnitError::NonFinite { .. }));
    }

    #[test]
    fn test_check_duration_rejects_negative() {
        assert!(check_time("t", Quantity::seconds(-1.0)).is_ok());
        let err = check_duration("duration", Quantity::seconds(-1.0)).unwrap_err();
        assert!(matches!(err, UnitError::Negative { .. }));
        assert!(check_duration("duration", Quantity::seconds(0.0)).is_ok());
    }

    #[test]
    fn test_sim_time_arithmetic() {
        let a = SimTime::from_millis(3.0);
        let b = SimTime::from_millis(5.0);

        assert_relative_eq!((a + b).as_millis(), 8.0);
        assert_relative_eq!((b - a).as_millis(), 2.0);
        assert_relative_eq!((a * 2.0).as_millis(), 6.0);
        assert_relative_eq!(b / a, 5.0 / 3.0);
        assert_eq!(a.min(b), a);
        assert_eq!(a.max(b), b);
        assert!(a < b);
    }

    #[test]
    fn test_display() {
        assert_eq!(Dimension::DIMENSIONLESS.to_string(), "1");
        assert_eq!(Quantity::seconds(2.0).to_string(), "2 s");
        assert_eq!(SimTime::from_secs(2.0).to_string(), "2 s");
        assert_eq!(SimTime::from_secs(0.5).to_string(), "500 ms");
    }
}
