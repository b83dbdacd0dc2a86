//! Collapse all elements of a record into one.

use contracts::{ItemShape, LinkError, Reduction, ValueKind, Values};
use nalgebra::Vector3;

use super::{reject, RecordAdapter, StageShapes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementReduce {
    op: Reduction,
}

impl ElementReduce {
    pub fn new(op: Reduction) -> Self {
        Self { op }
    }

    pub fn op(&self) -> Reduction {
        self.op
    }

    fn reduce_scalars(&self, xs: impl Iterator<Item = f64>) -> Option<f64> {
        let mut count = 0usize;
        let mut acc: Option<f64> = None;
        for x in xs {
            count += 1;
            acc = Some(match (self.op, acc) {
                (_, None) => x,
                (Reduction::Sum | Reduction::Mean, Some(a)) => a + x,
                (Reduction::Min, Some(a)) => a.min(x),
                (Reduction::Max, Some(a)) => a.max(x),
            });
        }
        match self.op {
            Reduction::Mean => acc.map(|a| a / count as f64),
            _ => acc,
        }
    }
}

impl RecordAdapter for ElementReduce {
    fn kind(&self) -> &'static str {
        "element_reduce"
    }

    fn output_shape(&self, input: &ItemShape) -> Result<ItemShape, LinkError> {
        match (input.kind(), self.op) {
            (ValueKind::Scalar, _) | (ValueKind::Vector, Reduction::Sum | Reduction::Mean) => {
                Ok(ItemShape::new(input.definition.clone(), 1))
            }
            (other, op) => Err(reject(
                input,
                self.kind(),
                format!("{op:?} is not defined for {other:?} values"),
            )),
        }
    }

    fn convert(&self, values: &Values, shapes: &StageShapes) -> Result<Values, LinkError> {
        let definition = &shapes.input.definition;
        match values {
            Values::Scalar(xs) => {
                let missing = definition.missing_scalar();
                let present = xs.iter().copied().filter(|&x| missing != Some(x));
                let reduced = self
                    .reduce_scalars(present)
                    .or(missing)
                    .unwrap_or(contracts::DEFAULT_MISSING);
                Ok(Values::Scalar(vec![reduced]))
            }
            Values::Vector(xs) => {
                let missing = definition.missing_vector();
                let present: Vec<&Vector3<f64>> =
                    xs.iter().filter(|&x| missing != Some(*x)).collect();
                let reduced = if present.is_empty() {
                    missing.unwrap_or_else(|| Vector3::repeat(contracts::DEFAULT_MISSING))
                } else {
                    let sum: Vector3<f64> = present.iter().copied().sum();
                    match self.op {
                        Reduction::Mean => sum / present.len() as f64,
                        _ => sum,
                    }
                };
                Ok(Values::Vector(vec![reduced]))
            }
            other => Err(LinkError::ValueKindMismatch {
                item: definition.caption.clone(),
                expected: definition.kind,
                actual: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ValueDefinition, DEFAULT_MISSING};

    fn shapes(count: usize) -> StageShapes {
        let input = ItemShape::new(ValueDefinition::scalar("q"), count);
        StageShapes {
            output: ItemShape::new(ValueDefinition::scalar("q"), 1),
            input,
        }
    }

    #[test]
    fn test_reductions() {
        let values = Values::Scalar(vec![1.0, 4.0, DEFAULT_MISSING, 7.0]);
        let cases = [
            (Reduction::Sum, 12.0),
            (Reduction::Mean, 4.0),
            (Reduction::Min, 1.0),
            (Reduction::Max, 7.0),
        ];
        for (op, expected) in cases {
            let out = ElementReduce::new(op).convert(&values, &shapes(4)).unwrap();
            assert_eq!(out, Values::Scalar(vec![expected]), "{op:?}");
        }
    }

    #[test]
    fn test_all_missing_stays_missing() {
        let out = ElementReduce::new(Reduction::Mean)
            .convert(&Values::Scalar(vec![DEFAULT_MISSING; 2]), &shapes(2))
            .unwrap();
        assert_eq!(out, Values::Scalar(vec![DEFAULT_MISSING]));
    }

    #[test]
    fn test_output_is_single_element() {
        let stage = ElementReduce::new(Reduction::Max);
        let input = ItemShape::new(ValueDefinition::scalar("q"), 9);
        assert_eq!(stage.output_shape(&input).unwrap().element_count, 1);

        let vectors = ItemShape::new(ValueDefinition::new("v", ValueKind::Vector), 3);
        assert!(stage.output_shape(&vectors).is_err());
        assert!(ElementReduce::new(Reduction::Mean).output_shape(&vectors).is_ok());
    }

    #[test]
    fn test_vector_mean() {
        let input = ItemShape::new(ValueDefinition::new("v", ValueKind::Vector), 2);
        let shapes = StageShapes {
            output: ItemShape::new(input.definition.clone(), 1),
            input,
        };
        let out = ElementReduce::new(Reduction::Mean)
            .convert(
                &Values::Vector(vec![Vector3::new(1.0, 0.0, 2.0), Vector3::new(3.0, 2.0, 0.0)]),
                &shapes,
            )
            .unwrap();
        assert_eq!(out, Values::Vector(vec![Vector3::new(2.0, 1.0, 1.0)]));
    }
}
