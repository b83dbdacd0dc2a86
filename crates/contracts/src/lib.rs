//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the linker: the time
//! model, the closed set of value kinds, time records, item descriptions,
//! diagnostics and the engine configuration.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Simulation time is a plain `f64` in the unit the composition agrees on
//! - A [`Time`] is either an instant or a span `[stamp, stamp + duration]`
//! - Records are ordered by their `stamp`

mod engine_config;
mod error;
mod item;
mod item_id;
mod record;
mod sync;
mod time;
mod value;

pub use engine_config::*;
pub use error::*;
pub use item::*;
pub use item_id::ItemId;
pub use record::TimeRecord;
pub use sync::*;
pub use time::*;
pub use value::*;
