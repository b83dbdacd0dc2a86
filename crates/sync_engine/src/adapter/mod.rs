//! Record adapters: transformation stages between a provider and its consumers.
//!
//! An adapter item wraps exactly one adaptee. On a pull it maps the requested
//! times to the times it needs from the adaptee, pulls those, converts each
//! record and re-stamps it to the requested time. Built-in stages cover the
//! common cases; anything else implements [`RecordAdapter`] directly.

mod cast;
mod linear;
mod reduce;
mod time_average;

pub use cast::ToScalar;
pub use linear::LinearConversion;
pub use reduce::ElementReduce;
pub use time_average::TimeAverage;

use contracts::{AdapterSpec, ItemShape, LinkError, TimeRecord, TimeSet, Values};

/// Input and output contract of one adapter stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageShapes {
    /// Shape produced by the adaptee
    pub input: ItemShape,
    /// Shape this stage exposes to its consumers
    pub output: ItemShape,
}

/// One transformation stage of an adapter chain
pub trait RecordAdapter: Send {
    /// Short identifier used in logs
    fn kind(&self) -> &'static str;

    /// Shape exposed when fed with `input`.
    ///
    /// # Errors
    /// `IncompatibleItems` if this stage cannot consume `input`.
    fn output_shape(&self, input: &ItemShape) -> Result<ItemShape, LinkError>;

    /// Times to request from the adaptee for `query`.
    ///
    /// Must return one time per requested time, in the same order.
    fn resolve_times(&self, query: &TimeSet) -> TimeSet {
        query.clone()
    }

    /// Convert one record's values
    fn convert(&self, values: &Values, shapes: &StageShapes) -> Result<Values, LinkError>;

    /// Convert adaptee records, stamping each with its requested time
    fn adapt_records(
        &self,
        records: &[TimeRecord],
        query: &TimeSet,
        shapes: &StageShapes,
    ) -> Result<Vec<TimeRecord>, LinkError> {
        records
            .iter()
            .zip(query.times())
            .map(|(record, time)| Ok(TimeRecord::new(*time, self.convert(record.values(), shapes)?)))
            .collect()
    }

    fn accepts(&self, input: &ItemShape) -> bool {
        self.output_shape(input).is_ok()
    }
}

/// Build a built-in stage from its declarative description
pub fn build(spec: &AdapterSpec) -> Result<Box<dyn RecordAdapter>, LinkError> {
    Ok(match spec {
        AdapterSpec::LinearConversion { factor, offset } => {
            Box::new(LinearConversion::new(*factor, *offset)?)
        }
        AdapterSpec::ElementReduce { op } => Box::new(ElementReduce::new(*op)),
        AdapterSpec::TimeAverage { window } => Box::new(TimeAverage::new(*window)?),
        AdapterSpec::ToScalar => Box::new(ToScalar),
    })
}

fn reject(input: &ItemShape, stage: &str, message: impl Into<String>) -> LinkError {
    LinkError::incompatible(input.definition.caption.as_str(), stage, message)
}
