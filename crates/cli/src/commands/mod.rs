//! Command implementations.

mod demo;
mod info;
mod validate;

pub use demo::{load_demo_settings, run_demo};
pub use info::run_info;
pub use validate::run_validate;
