//! # Sync Engine
//!
//! Demand-driven synchronization core of the linker.
//!
//! Responsibilities:
//! - time-ordered record caches with interpolation / extrapolation
//! - the bounded pull loop that advances owning components on demand
//! - chained record adapters with per-consumer memo caches
//! - linkages between producers and consumers, with orphan reclamation
//!
//! ## Example
//!
//! ```ignore
//! use sync_engine::{Composition, RampComponent};
//!
//! let mut composition = Composition::default();
//! let owner = composition.add_component(RampComponent::new("ramp", "flow", 0.0, 1.0));
//! let flow = composition.add_item(Some(owner), ItemDescription::output("flow", def.clone(), 1))?;
//! let gauge = composition.add_item(None, ItemDescription::input("gauge", def, 1))?;
//! composition.connect(gauge, flow)?;
//!
//! let pulled = composition.get_values(gauge, &TimeSet::single(2.5))?;
//! if pulled.is_extrapolated() {
//!     // inspect pulled.diagnostics
//! }
//! ```

pub mod adapter;
mod cache;
mod component;
mod composition;
mod events;
mod interpolation;
mod item;
mod linkage;
pub mod mock;
mod synchronizer;

pub use adapter::{RecordAdapter, StageShapes};
pub use cache::{InsertOutcome, Sample, SampleQuality, TimeRecordCache};
pub use component::{LinkableComponent, UpdateContext};
pub use composition::Composition;
pub use events::{EventLog, DEFAULT_EVENT_LOG_CAPACITY};
pub use interpolation::{blend, weighted_sum};
pub use item::{ComponentHandle, ExchangeItem, ItemHandle, LinkageHandle};
pub use linkage::Linkage;
pub use mock::{CoupledComponent, RampComponent, StalledComponent};
pub use synchronizer::{Advance, PullReport, PullSynchronizer, SyncState};

// Re-export contracts types
pub use contracts::{
    CacheConfig, Coverage, Diagnostic, DiagnosticLevel, EngineConfig, ExtrapolationPolicy,
    ExtrapolationReason, InterpolationPolicy, Pulled,
};
