//! `y = factor * x + offset`, element-wise; missing elements stay missing.

use contracts::{ItemShape, LinkError, ValueKind, Values};
use nalgebra::Vector3;

use super::{reject, RecordAdapter, StageShapes};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearConversion {
    factor: f64,
    offset: f64,
}

impl LinearConversion {
    pub fn new(factor: f64, offset: f64) -> Result<Self, LinkError> {
        if !factor.is_finite() || !offset.is_finite() {
            return Err(LinkError::config_validation(
                "linear_conversion",
                "factor and offset must be finite",
            ));
        }
        Ok(Self { factor, offset })
    }

    #[inline]
    fn apply(&self, x: f64) -> f64 {
        self.factor * x + self.offset
    }
}

impl RecordAdapter for LinearConversion {
    fn kind(&self) -> &'static str {
        "linear_conversion"
    }

    fn output_shape(&self, input: &ItemShape) -> Result<ItemShape, LinkError> {
        match input.kind() {
            ValueKind::Scalar | ValueKind::Vector => Ok(input.clone()),
            other => Err(reject(
                input,
                self.kind(),
                format!("cannot scale {other:?} values"),
            )),
        }
    }

    fn convert(&self, values: &Values, shapes: &StageShapes) -> Result<Values, LinkError> {
        let definition = &shapes.input.definition;
        match values {
            Values::Scalar(xs) => {
                let missing = definition.missing_scalar();
                Ok(Values::Scalar(
                    xs.iter()
                        .map(|&x| if missing == Some(x) { x } else { self.apply(x) })
                        .collect(),
                ))
            }
            Values::Vector(xs) => {
                let missing = definition.missing_vector();
                let offset = Vector3::repeat(self.offset);
                Ok(Values::Vector(
                    xs.iter()
                        .map(|x| {
                            if missing == Some(*x) {
                                *x
                            } else {
                                x * self.factor + offset
                            }
                        })
                        .collect(),
                ))
            }
            other => Err(LinkError::ValueKindMismatch {
                item: definition.caption.clone(),
                expected: definition.kind,
                actual: other.kind(),
            }),
        }
    }
}
