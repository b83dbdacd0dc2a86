//! Closed set of value kinds carried by exchange items.
//!
//! Each kind decides whether it can be linearly interpolated; the engine never
//! inspects payload types at runtime beyond matching on [`Values`].

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{Time, TimeRecord};

/// Default missing-data sentinel for numeric kinds
pub const DEFAULT_MISSING: f64 = -999.0;

/// Value kind of an exchange item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Real number per element
    Scalar,
    /// 3-component real vector per element
    Vector,
    /// Integer count or code
    Integer,
    /// Flag
    Boolean,
    /// Free text or enumerated label
    Text,
}

impl ValueKind {
    /// Whether `below + factor * (above - below)` is meaningful for this kind
    #[inline]
    pub fn supports_linear(self) -> bool {
        matches!(self, Self::Scalar | Self::Vector)
    }

    /// Missing sentinel used when a definition does not name one
    pub fn default_missing(self) -> Value {
        match self {
            Self::Scalar => Value::Scalar(DEFAULT_MISSING),
            Self::Vector => Value::Vector(Vector3::repeat(DEFAULT_MISSING)),
            Self::Integer => Value::Integer(DEFAULT_MISSING as i64),
            Self::Boolean => Value::Boolean(false),
            Self::Text => Value::Text(String::new()),
        }
    }
}

/// A single element of some kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Scalar(f64),
    Vector(Vector3<f64>),
    Integer(i64),
    Boolean(bool),
    Text(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Scalar(_) => ValueKind::Scalar,
            Self::Vector(_) => ValueKind::Vector,
            Self::Integer(_) => ValueKind::Integer,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Text(_) => ValueKind::Text,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

/// Homogeneous array of elements, one per spatial element of an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Values {
    Scalar(Vec<f64>),
    Vector(Vec<Vector3<f64>>),
    Integer(Vec<i64>),
    Boolean(Vec<bool>),
    Text(Vec<String>),
}

impl Values {
    /// `count` copies of `value`
    pub fn filled(value: &Value, count: usize) -> Self {
        match value {
            Value::Scalar(v) => Self::Scalar(vec![*v; count]),
            Value::Vector(v) => Self::Vector(vec![*v; count]),
            Value::Integer(v) => Self::Integer(vec![*v; count]),
            Value::Boolean(v) => Self::Boolean(vec![*v; count]),
            Value::Text(v) => Self::Text(vec![v.clone(); count]),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Scalar(_) => ValueKind::Scalar,
            Self::Vector(_) => ValueKind::Vector,
            Self::Integer(_) => ValueKind::Integer,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Text(_) => ValueKind::Text,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(v) => v.len(),
            Self::Vector(v) => v.len(),
            Self::Integer(v) => v.len(),
            Self::Boolean(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> Option<Value> {
        match self {
            Self::Scalar(v) => v.get(index).copied().map(Value::Scalar),
            Self::Vector(v) => v.get(index).copied().map(Value::Vector),
            Self::Integer(v) => v.get(index).copied().map(Value::Integer),
            Self::Boolean(v) => v.get(index).copied().map(Value::Boolean),
            Self::Text(v) => v.get(index).cloned().map(Value::Text),
        }
    }

    pub fn as_scalars(&self) -> Option<&[f64]> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }
}

/// Element type plus the sentinel that marks missing data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDefinition {
    /// Quantity caption, e.g. "discharge"
    #[serde(default)]
    pub caption: String,
    pub kind: ValueKind,
    pub missing_value: Value,
}

impl ValueDefinition {
    /// Definition with the kind's default missing sentinel
    pub fn new(caption: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            caption: caption.into(),
            kind,
            missing_value: kind.default_missing(),
        }
    }

    pub fn scalar(caption: impl Into<String>) -> Self {
        Self::new(caption, ValueKind::Scalar)
    }

    /// Override the missing sentinel; ignored if its kind differs
    pub fn with_missing(mut self, missing: Value) -> Self {
        if missing.kind() == self.kind {
            self.missing_value = missing;
        }
        self
    }

    /// Scalar sentinel, if the kind is scalar
    pub fn missing_scalar(&self) -> Option<f64> {
        self.missing_value.as_scalar()
    }

    /// Vector sentinel, if the kind is vector
    pub fn missing_vector(&self) -> Option<Vector3<f64>> {
        match self.missing_value {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// Array of `count` missing elements
    pub fn missing_values(&self, count: usize) -> Values {
        Values::filled(&self.missing_value, count)
    }
}

/// Values answered for a requested time-set, one row per requested time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueSet {
    times: Vec<Time>,
    rows: Vec<Values>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: Time, values: Values) {
        self.times.push(time);
        self.rows.push(values);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn times(&self) -> &[Time] {
        &self.times
    }

    pub fn rows(&self) -> &[Values] {
        &self.rows
    }

    /// Row answered for the `index`-th requested time
    pub fn row(&self, index: usize) -> Option<&Values> {
        self.rows.get(index)
    }

    /// Scalar element `element` of row `row`
    pub fn scalar(&self, row: usize, element: usize) -> Option<f64> {
        self.rows
            .get(row)
            .and_then(Values::as_scalars)
            .and_then(|v| v.get(element).copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Time, &Values)> {
        self.times.iter().zip(self.rows.iter())
    }

    /// One record per requested time
    pub fn into_records(self) -> Vec<TimeRecord> {
        self.times
            .into_iter()
            .zip(self.rows)
            .map(|(time, values)| TimeRecord::new(time, values))
            .collect()
    }
}
