//! Pulled - pull protocol output
//!
//! Result envelope of a demand-driven pull plus the diagnostics raised
//! while producing it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ItemId, TimeSet, ValueSet};

/// Why an answer had to be extrapolated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExtrapolationReason {
    /// Owning component was already updating (re-entrant pull)
    Busy,
    /// Retry budget exhausted
    RetryLimit { attempts: usize },
    /// Owning component is done and cannot advance
    OwnerFinished,
    /// Cache covered the request only through its extrapolation policy
    OutOfRange,
}

impl fmt::Display for ExtrapolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => f.write_str("busy"),
            Self::RetryLimit { .. } => f.write_str("retry_limit"),
            Self::OwnerFinished => f.write_str("owner_finished"),
            Self::OutOfRange => f.write_str("out_of_range"),
        }
    }
}

/// Whether a pull was fully satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    /// Every requested time was answered from cached data
    Satisfied,
    /// At least one requested time was extrapolated
    Extrapolated(ExtrapolationReason),
}

impl Coverage {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }

    pub fn reason(&self) -> Option<ExtrapolationReason> {
        match self {
            Self::Satisfied => None,
            Self::Extrapolated(reason) => Some(*reason),
        }
    }

    /// Label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Satisfied => "satisfied",
            Self::Extrapolated(_) => "extrapolated",
        }
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

impl DiagnosticLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Observable event raised when a pull degrades
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// Producer the pull was directed at
    pub item: ItemId,
    pub reason: ExtrapolationReason,
    /// Times that were requested
    pub requested: TimeSet,
    /// Human readable explanation
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        level: DiagnosticLevel,
        item: ItemId,
        reason: ExtrapolationReason,
        requested: TimeSet,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            item,
            reason,
            requested,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.level.as_str(),
            self.item,
            self.reason,
            self.message
        )
    }
}

/// Answer to `get_values`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pulled {
    pub values: ValueSet,
    pub coverage: Coverage,
    /// `update()` calls issued on behalf of this pull, across the whole chain
    pub updates: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl Pulled {
    pub fn is_extrapolated(&self) -> bool {
        !self.coverage.is_satisfied()
    }
}
