//! Mean over a trailing window.
//!
//! A request at `t` is served by asking the adaptee for the span
//! `[t - window, t]`; the span answer (a time-weighted mean under linear
//! interpolation) is re-stamped to `t`.

use contracts::{ItemShape, LinkError, Time, TimeSet, Values};

use super::{reject, RecordAdapter, StageShapes};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAverage {
    window: f64,
}

impl TimeAverage {
    pub fn new(window: f64) -> Result<Self, LinkError> {
        if !(window.is_finite() && window > 0.0) {
            return Err(LinkError::config_validation(
                "time_average.window",
                format!("window must be positive, got {window}"),
            ));
        }
        Ok(Self { window })
    }

    pub fn window(&self) -> f64 {
        self.window
    }
}

impl RecordAdapter for TimeAverage {
    fn kind(&self) -> &'static str {
        "time_average"
    }

    fn output_shape(&self, input: &ItemShape) -> Result<ItemShape, LinkError> {
        if input.kind().supports_linear() {
            Ok(input.clone())
        } else {
            Err(reject(
                input,
                self.kind(),
                format!("cannot average {:?} values", input.kind()),
            ))
        }
    }

    fn resolve_times(&self, query: &TimeSet) -> TimeSet {
        query.map(|time| Time::span(time.stamp() - self.window, time.end()))
    }

    fn convert(&self, values: &Values, _shapes: &StageShapes) -> Result<Values, LinkError> {
        Ok(values.clone())
    }
}
