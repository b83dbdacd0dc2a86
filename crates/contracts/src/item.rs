//! Exchange item descriptions
//!
//! Declarative, serializable descriptions used to construct items and
//! adapter stages. Persistence of these descriptions is left to callers.

use serde::{Deserialize, Serialize};

use crate::{ItemId, TimeSet, ValueDefinition, ValueKind};

/// Direction of an exchange item relative to its component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRole {
    /// Produces values (provider)
    Output,
    /// Requests values from exactly one provider
    Input,
}

/// Value-count contract of an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemShape {
    pub definition: ValueDefinition,
    /// Number of spatial elements per record
    pub element_count: usize,
}

impl ItemShape {
    pub fn new(definition: ValueDefinition, element_count: usize) -> Self {
        Self {
            definition,
            element_count,
        }
    }

    pub fn kind(&self) -> ValueKind {
        self.definition.kind
    }

    /// Kind and element count both match
    pub fn matches(&self, other: &ItemShape) -> bool {
        self.kind() == other.kind() && self.element_count == other.element_count
    }
}

/// Declarative description of an exchange item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDescription {
    pub id: ItemId,
    #[serde(default)]
    pub caption: String,
    pub role: ItemRole,
    #[serde(flatten)]
    pub shape: ItemShape,
    /// Times currently requested (inputs) or last served (outputs)
    #[serde(default)]
    pub time_set: TimeSet,
}

impl ItemDescription {
    pub fn output(id: impl Into<ItemId>, definition: ValueDefinition, element_count: usize) -> Self {
        Self {
            id: id.into(),
            caption: String::new(),
            role: ItemRole::Output,
            shape: ItemShape::new(definition, element_count),
            time_set: TimeSet::new(),
        }
    }

    pub fn input(id: impl Into<ItemId>, definition: ValueDefinition, element_count: usize) -> Self {
        Self {
            id: id.into(),
            caption: String::new(),
            role: ItemRole::Input,
            shape: ItemShape::new(definition, element_count),
            time_set: TimeSet::new(),
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }
}

/// Element reduction applied by the `element_reduce` adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    Sum,
    Mean,
    Min,
    Max,
}

/// Declarative description of a built-in adapter stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdapterSpec {
    /// `y = factor * x + offset`
    LinearConversion { factor: f64, offset: f64 },
    /// Collapse all elements into one
    ElementReduce { op: Reduction },
    /// Mean over `[t - window, t]`
    TimeAverage { window: f64 },
    /// Integer/boolean to scalar
    ToScalar,
}

/// Status reported by an owning component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    /// Ready to advance
    #[default]
    Idle,
    /// Inside an update call
    Updating,
    /// Reached its end time; cannot advance further
    Done,
    /// Unrecoverable failure
    Failed,
}
