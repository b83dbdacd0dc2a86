//! Integer and boolean values widened to scalars.

use contracts::{ItemShape, LinkError, ValueDefinition, ValueKind, Values};

use super::{reject, RecordAdapter, StageShapes};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToScalar;

impl RecordAdapter for ToScalar {
    fn kind(&self) -> &'static str {
        "to_scalar"
    }

    fn output_shape(&self, input: &ItemShape) -> Result<ItemShape, LinkError> {
        match input.kind() {
            ValueKind::Integer | ValueKind::Boolean => Ok(ItemShape::new(
                ValueDefinition::scalar(input.definition.caption.as_str()),
                input.element_count,
            )),
            other => Err(reject(
                input,
                self.kind(),
                format!("cannot widen {other:?} values"),
            )),
        }
    }

    fn convert(&self, values: &Values, shapes: &StageShapes) -> Result<Values, LinkError> {
        let missing_out = shapes
            .output
            .definition
            .missing_scalar()
            .unwrap_or(contracts::DEFAULT_MISSING);

        match values {
            Values::Integer(xs) => {
                let missing_in = match shapes.input.definition.missing_value {
                    contracts::Value::Integer(m) => Some(m),
                    _ => None,
                };
                Ok(Values::Scalar(
                    xs.iter()
                        .map(|&x| {
                            if missing_in == Some(x) {
                                missing_out
                            } else {
                                x as f64
                            }
                        })
                        .collect(),
                ))
            }
            Values::Boolean(xs) => Ok(Values::Scalar(
                xs.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
            )),
            other => Err(LinkError::ValueKindMismatch {
                item: shapes.input.definition.caption.clone(),
                expected: shapes.input.kind(),
                actual: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DEFAULT_MISSING;

    #[test]
    fn test_integer_missing_maps_to_scalar_missing() {
        let input = ItemShape::new(ValueDefinition::new("n", ValueKind::Integer), 3);
        let output = ToScalar.output_shape(&input).unwrap();
        assert_eq!(output.kind(), ValueKind::Scalar);

        let shapes = StageShapes { input, output };
        let out = ToScalar
            .convert(&Values::Integer(vec![3, -999, 0]), &shapes)
            .unwrap();
        assert_eq!(out, Values::Scalar(vec![3.0, DEFAULT_MISSING, 0.0]));
    }

    #[test]
    fn test_booleans() {
        let input = ItemShape::new(ValueDefinition::new("wet", ValueKind::Boolean), 2);
        let output = ToScalar.output_shape(&input).unwrap();
        let shapes = StageShapes { input, output };
        let out = ToScalar
            .convert(&Values::Boolean(vec![true, false]), &shapes)
            .unwrap();
        assert_eq!(out, Values::Scalar(vec![1.0, 0.0]));
    }
}
