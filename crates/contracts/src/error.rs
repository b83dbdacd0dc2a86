//! Layered error definitions
//!
//! Categorized by source: structure / values / components / config.
//! Runtime degradation (busy producers, exhausted retries) is reported through
//! [`crate::Diagnostic`] and never through this type.

use thiserror::Error;

use crate::ValueKind;

/// Unified error type
#[derive(Debug, Error)]
pub enum LinkError {
    // ===== Time / Value Errors =====
    /// A record was produced earlier than the last cached one
    #[error("time ordering violated on '{item}': record at {record_time} is before last cached {last_time}")]
    TimeOrdering {
        item: String,
        record_time: f64,
        last_time: f64,
    },

    /// Linear interpolation requested for a non-interpolable kind
    #[error("linear interpolation is not supported for {kind:?} values")]
    UnsupportedInterpolation { kind: ValueKind },

    /// Record kind differs from the item's value definition
    #[error("value kind mismatch on '{item}': expected {expected:?}, got {actual:?}")]
    ValueKindMismatch {
        item: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// Record length differs from the item's element count
    #[error("value count mismatch on '{item}': expected {expected}, got {actual}")]
    ValueCountMismatch {
        item: String,
        expected: usize,
        actual: usize,
    },

    // ===== Structural Errors =====
    /// Adapter has no adaptee and cannot synthesize data
    #[error("adapter '{adapter}' has no adaptee")]
    MissingAdaptee { adapter: String },

    /// Provider chain is broken or cyclic
    #[error("broken chain at '{item}': {message}")]
    BrokenChain { item: String, message: String },

    /// Two neighbouring items of a chain cannot be linked
    #[error("'{provider}' cannot feed '{consumer}': {message}")]
    IncompatibleItems {
        provider: String,
        consumer: String,
        message: String,
    },

    /// Item id already used in the composition
    #[error("duplicate item id: {item}")]
    DuplicateItem { item: String },

    /// Handle or id does not address a live item
    #[error("unknown item: {item}")]
    UnknownItem { item: String },

    /// Handle does not address a live component
    #[error("unknown component: {component}")]
    UnknownComponent { component: String },

    /// Consumer has no provider
    #[error("consumer '{item}' is not connected")]
    NotConnected { item: String },

    /// Consumer already has a provider
    #[error("consumer '{item}' is already connected to '{provider}'")]
    AlreadyConnected { item: String, provider: String },

    // ===== Component Errors =====
    /// Owning component reported failure
    #[error("component '{component}' failed: {message}")]
    ComponentFailed { component: String, message: String },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl LinkError {
    /// Create broken chain error
    pub fn broken_chain(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrokenChain {
            item: item.into(),
            message: message.into(),
        }
    }

    /// Create incompatible items error
    pub fn incompatible(
        provider: impl Into<String>,
        consumer: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::IncompatibleItems {
            provider: provider.into(),
            consumer: consumer.into(),
            message: message.into(),
        }
    }

    /// Create unknown item error
    pub fn unknown_item(item: impl ToString) -> Self {
        Self::UnknownItem {
            item: item.to_string(),
        }
    }

    /// Create component failure error
    pub fn component_failed(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ComponentFailed {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the error describes an invalid composition rather than bad data
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MissingAdaptee { .. }
                | Self::BrokenChain { .. }
                | Self::IncompatibleItems { .. }
                | Self::NotConnected { .. }
                | Self::AlreadyConnected { .. }
        )
    }
}
