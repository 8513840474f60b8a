//! Stop conditions for [`Model::run`](super::Model::run) and the report
//! it returns.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::time::VirtualTime;

/// Bounds on a single `run` call. Both are optional; with neither set
/// the run continues until the queue empties.
///
/// Deserializes from JSON such as `{"max_time": 10.0}`; missing fields
/// mean "unbounded".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunLimits {
    /// Events with `time > max_time` stay queued (the bound is inclusive).
    pub max_time: Option<VirtualTime>,
    /// Maximum number of events dispatched by this call.
    pub max_events: Option<u64>,
}

impl RunLimits {
    /// Run until the queue is empty.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Run while the next event is at or before `max_time`.
    pub fn until(max_time: impl Into<VirtualTime>) -> Self {
        Self::unbounded().with_max_time(max_time)
    }

    /// Dispatch at most `max_events` events.
    pub fn events(max_events: u64) -> Self {
        Self::unbounded().with_max_events(max_events)
    }

    pub fn with_max_time(mut self, max_time: impl Into<VirtualTime>) -> Self {
        self.max_time = Some(max_time.into());
        self
    }

    pub fn with_max_events(mut self, max_events: u64) -> Self {
        self.max_events = Some(max_events);
        self
    }

    /// Parse limits from a JSON document.
    pub fn from_json(json: &str) -> SimResult<Self> {
        let limits: RunLimits = serde_json::from_str(json)?;
        limits.validate()?;
        Ok(limits)
    }

    /// A NaN `max_time` bounds nothing meaningful and is rejected.
    pub fn validate(&self) -> SimResult<()> {
        match self.max_time {
            Some(max) if !max.is_valid() => {
                Err(SimError::Config(format!("max_time must not be NaN, got {}", max)))
            }
            _ => Ok(()),
        }
    }
}

/// Why a `run` call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The queue is empty.
    Exhausted,
    /// The next event lies beyond `max_time`.
    TimeLimit,
    /// `max_events` events were dispatched.
    EventLimit,
}

/// Summary of one `run` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Events dispatched during this call.
    pub processed: u64,
    pub stop: StopReason,
    /// Clock value when the call returned.
    pub now: VirtualTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        assert_eq!(RunLimits::unbounded().max_time, None);
        assert_eq!(RunLimits::until(5.0).max_time, Some(VirtualTime::new(5.0)));
        assert_eq!(RunLimits::events(3).max_events, Some(3));

        let both = RunLimits::until(1.5).with_max_events(2);
        assert_eq!(both.max_time, Some(VirtualTime::new(1.5)));
        assert_eq!(both.max_events, Some(2));
    }

    #[test]
    fn test_from_json() {
        let limits = RunLimits::from_json(r#"{"max_time": 10.0}"#).unwrap();
        assert_eq!(limits, RunLimits::until(10.0));

        let limits = RunLimits::from_json("{}").unwrap();
        assert_eq!(limits, RunLimits::unbounded());

        let limits = RunLimits::from_json(r#"{"max_time": 2.5, "max_events": 7}"#).unwrap();
        assert_eq!(limits, RunLimits::until(2.5).with_max_events(7));
    }

    #[test]
    fn test_from_json_rejects_unknown_fields() {
        let err = RunLimits::from_json(r#"{"max_steps": 3}"#).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn test_nan_max_time_is_rejected() {
        assert!(matches!(
            RunLimits::until(f64::NAN).validate(),
            Err(SimError::Config(_))
        ));
        assert!(RunLimits::until(f64::INFINITY).validate().is_ok());
        assert!(RunLimits::unbounded().validate().is_ok());
    }
}
