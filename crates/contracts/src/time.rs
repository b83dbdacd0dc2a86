//! Time model: instants, spans and requested time-sets.

use serde::{Deserialize, Serialize};

/// A point in simulation time, or a span starting at `stamp`.
///
/// `duration == 0.0` denotes an instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Time {
    stamp: f64,
    #[serde(default)]
    duration: f64,
}

impl Time {
    /// Zero-duration instant
    #[inline]
    pub fn instant(stamp: f64) -> Self {
        Self {
            stamp,
            duration: 0.0,
        }
    }

    /// Span `[start, end]`; a reversed span collapses to an instant at `start`
    #[inline]
    pub fn span(start: f64, end: f64) -> Self {
        Self {
            stamp: start,
            duration: (end - start).max(0.0),
        }
    }

    #[inline]
    pub fn stamp(&self) -> f64 {
        self.stamp
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// End of the span (equal to `stamp` for instants)
    #[inline]
    pub fn end(&self) -> f64 {
        self.stamp + self.duration
    }

    #[inline]
    pub fn is_instant(&self) -> bool {
        self.duration <= 0.0
    }

    /// Same time moved by `offset`
    #[inline]
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            stamp: self.stamp + offset,
            duration: self.duration,
        }
    }
}

impl From<f64> for Time {
    fn from(stamp: f64) -> Self {
        Self::instant(stamp)
    }
}

/// Times a consumer currently requests, plus the horizon it may ask for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSet {
    times: Vec<Time>,
    #[serde(default)]
    horizon: Option<Time>,
}

impl TimeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time-set holding a single time
    pub fn single(time: impl Into<Time>) -> Self {
        Self {
            times: vec![time.into()],
            horizon: None,
        }
    }

    /// Time-set of instants
    pub fn instants(stamps: impl IntoIterator<Item = f64>) -> Self {
        Self {
            times: stamps.into_iter().map(Time::instant).collect(),
            horizon: None,
        }
    }

    pub fn with_horizon(mut self, horizon: Time) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn push(&mut self, time: impl Into<Time>) {
        self.times.push(time.into());
    }

    pub fn times(&self) -> &[Time] {
        &self.times
    }

    pub fn horizon(&self) -> Option<Time> {
        self.horizon
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Earliest stamp requested
    pub fn earliest(&self) -> Option<f64> {
        self.times.iter().map(Time::stamp).reduce(f64::min)
    }

    /// Latest end requested
    pub fn latest(&self) -> Option<f64> {
        self.times.iter().map(Time::end).reduce(f64::max)
    }

    /// Apply `f` to every time, keeping the horizon
    pub fn map(&self, f: impl Fn(&Time) -> Time) -> Self {
        Self {
            times: self.times.iter().map(f).collect(),
            horizon: self.horizon,
        }
    }
}

impl FromIterator<Time> for TimeSet {
    fn from_iter<I: IntoIterator<Item = Time>>(iter: I) -> Self {
        Self {
            times: iter.into_iter().collect(),
            horizon: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_end() {
        let span = Time::span(2.0, 5.0);
        assert_eq!(span.stamp(), 2.0);
        assert_eq!(span.end(), 5.0);
        assert!(!span.is_instant());
        assert!(Time::span(5.0, 2.0).is_instant());
    }

    #[test]
    fn test_time_set_bounds() {
        let mut set = TimeSet::instants([3.0, 1.0]);
        set.push(Time::span(2.0, 6.0));
        assert_eq!(set.earliest(), Some(1.0));
        assert_eq!(set.latest(), Some(6.0));
        assert_eq!(TimeSet::new().earliest(), None);
    }

    #[test]
    fn test_time_set_serde_defaults() {
        let set: TimeSet = serde_json::from_str(r#"{"times":[{"stamp":1.5}]}"#).unwrap();
        assert_eq!(set.times(), &[Time::instant(1.5)]);
        assert!(set.horizon().is_none());
    }
}
