//! Merge module - Multi-manager merge and apply operations.
//!
//! This module computes merged values and the resulting field ownership.

mod comparison;
mod conflict;
mod updater;


pub use comparison::*;
pub use conflict::*;
pub use updater::*;
