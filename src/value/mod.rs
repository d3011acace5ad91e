//! Value module - In-memory representation of resource documents.
//!
//! Documents are trees of mappings with scalar leaves. This module also owns
//! the validation errors raised for malformed documents.

mod validation;
mod value;

pub use validation::*;
pub use value::*;
