//! TimeRecord - the unit stored by every cache

use serde::{Deserialize, Serialize};

use crate::{Time, Values};

/// Immutable pairing of a time with one value per element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRecord {
    time: Time,
    values: Values,
}

impl TimeRecord {
    pub fn new(time: impl Into<Time>, values: Values) -> Self {
        Self {
            time: time.into(),
            values,
        }
    }

    #[inline]
    pub fn time(&self) -> Time {
        self.time
    }

    /// Ordering key
    #[inline]
    pub fn stamp(&self) -> f64 {
        self.time.stamp()
    }

    #[inline]
    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn into_parts(self) -> (Time, Values) {
        (self.time, self.values)
    }
}
