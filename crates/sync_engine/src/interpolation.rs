//! Interpolation kernels per value kind.
//!
//! Only scalar and vector kinds blend; every other kind is rejected with
//! `UnsupportedInterpolation`. An element equal to the missing sentinel on
//! either side yields the sentinel.

use contracts::{LinkError, ValueDefinition, Values};
use nalgebra::Vector3;

/// Element-wise `below + factor * (above - below)`.
///
/// `factor` outside `[0, 1]` extrapolates along the same line.
pub fn blend(
    below: &Values,
    above: &Values,
    factor: f64,
    definition: &ValueDefinition,
) -> Result<Values, LinkError> {
    check_lengths(below, above, definition)?;

    match (below, above) {
        (Values::Scalar(lo), Values::Scalar(hi)) => {
            let missing = definition.missing_scalar();
            Ok(Values::Scalar(
                lo.iter()
                    .zip(hi)
                    .map(|(&a, &b)| blend_scalar(a, b, factor, missing))
                    .collect(),
            ))
        }
        (Values::Vector(lo), Values::Vector(hi)) => {
            let missing = definition.missing_vector();
            Ok(Values::Vector(
                lo.iter()
                    .zip(hi)
                    .map(|(a, b)| blend_vector(a, b, factor, missing))
                    .collect(),
            ))
        }
        _ => Err(LinkError::UnsupportedInterpolation {
            kind: below.kind(),
        }),
    }
}

/// Weighted sum `Σ wᵢ·rowᵢ`; weights are expected to sum to one.
pub fn weighted_sum(
    rows: &[(f64, &Values)],
    definition: &ValueDefinition,
) -> Result<Values, LinkError> {
    let Some((_, first)) = rows.first() else {
        return Ok(definition.missing_values(0));
    };
    for (_, row) in &rows[1..] {
        check_lengths(first, row, definition)?;
    }

    match first {
        Values::Scalar(head) => {
            let missing = definition.missing_scalar();
            let mut out = vec![0.0; head.len()];
            for (index, slot) in out.iter_mut().enumerate() {
                for (weight, row) in rows {
                    let Values::Scalar(row) = row else {
                        return Err(kind_mismatch(definition, row));
                    };
                    let value = row[index];
                    if missing == Some(value) {
                        *slot = value;
                        break;
                    }
                    *slot += weight * value;
                }
            }
            Ok(Values::Scalar(out))
        }
        Values::Vector(head) => {
            let missing = definition.missing_vector();
            let mut out = vec![Vector3::zeros(); head.len()];
            for (index, slot) in out.iter_mut().enumerate() {
                for (weight, row) in rows {
                    let Values::Vector(row) = row else {
                        return Err(kind_mismatch(definition, row));
                    };
                    let value = row[index];
                    if missing == Some(value) {
                        *slot = value;
                        break;
                    }
                    *slot += value * *weight;
                }
            }
            Ok(Values::Vector(out))
        }
        other => Err(LinkError::UnsupportedInterpolation { kind: other.kind() }),
    }
}

#[inline]
fn blend_scalar(a: f64, b: f64, factor: f64, missing: Option<f64>) -> f64 {
    match missing {
        Some(m) if a == m || b == m => m,
        _ => a + factor * (b - a),
    }
}

#[inline]
fn blend_vector(
    a: &Vector3<f64>,
    b: &Vector3<f64>,
    factor: f64,
    missing: Option<Vector3<f64>>,
) -> Vector3<f64> {
    match missing {
        Some(m) if *a == m || *b == m => m,
        _ => a + (b - a) * factor,
    }
}

fn check_lengths(a: &Values, b: &Values, definition: &ValueDefinition) -> Result<(), LinkError> {
    if a.kind() != b.kind() {
        return Err(kind_mismatch(definition, b));
    }
    if a.len() != b.len() {
        return Err(LinkError::ValueCountMismatch {
            item: definition.caption.clone(),
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

fn kind_mismatch(definition: &ValueDefinition, actual: &Values) -> LinkError {
    LinkError::ValueKindMismatch {
        item: definition.caption.clone(),
        expected: definition.kind,
        actual: actual.kind(),
    }
}
