//! Virtual time for the simulation kernel.
//!
//! Represents a real-valued logical timestamp with no dependency on
//! `std::time`. Time advances only when the run loop pops events, never
//! from wall-clock observation.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A point on the simulation's virtual clock.
///
/// Wraps an `f64` so that sampled deltas (exponential inter-arrival
/// times and the like) can be added directly. Ordering is total via
/// [`f64::total_cmp`], which makes `VirtualTime` usable as a heap key.
/// `-0.0` is stored as `0.0`, since `total_cmp` would place it before
/// zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct VirtualTime(f64);

impl VirtualTime {
    /// The zero-point of simulation time.
    pub const ZERO: VirtualTime = VirtualTime(0.0);

    /// Create a new `VirtualTime` from a raw value.
    #[inline]
    pub fn new(value: f64) -> Self {
        VirtualTime(if value == 0.0 { 0.0 } else { value })
    }

    /// Return the raw value.
    #[inline]
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Compute the time that is `delta` units after `self`.
    #[inline]
    pub fn plus(self, delta: f64) -> VirtualTime {
        VirtualTime::new(self.0 + delta)
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: VirtualTime) -> bool {
        self < other
    }

    /// `NaN` has no place on a clock; the scheduler rejects it.
    #[inline]
    pub fn is_valid(self) -> bool {
        !self.0.is_nan()
    }

    /// Elapsed time between two points.
    /// Returns `None` if `earlier` is after `self`.
    #[inline]
    pub fn duration_since(self, earlier: VirtualTime) -> Option<f64> {
        if earlier > self {
            None
        } else {
            Some(self.0 - earlier.0)
        }
    }
}

impl Default for VirtualTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<f64> for VirtualTime {
    fn from(value: f64) -> Self {
        VirtualTime::new(value)
    }
}

impl From<VirtualTime> for f64 {
    fn from(time: VirtualTime) -> Self {
        time.0
    }
}

impl PartialEq for VirtualTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VirtualTime {}

impl Ord for VirtualTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for VirtualTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T={}", self.0)
    }
}
