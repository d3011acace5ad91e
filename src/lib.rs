//! # Structured Apply
//!
//! An in-process store of structured resources that many independent
//! managers write to with partial, intent-based documents.
//!
//! Every write is merged into the stored value while the engine tracks, per
//! field, which manager is responsible for it. Two managers that disagree on
//! a field produce a conflict unless the writer forces the change, in which
//! case ownership moves to it.
//!
//! ## Modules
//!
//! - [`value`] - In-memory representation of YAML/JSON documents
//! - [`fieldpath`] - Field paths, path sets and per-manager ownership tracking
//! - [`merge`] - Multi-manager merge, update and conflict detection
//! - [`store`] - Per-identity serialized resource storage
//! - [`engine`] - The apply, create, update, get and delete entry points
//! - [`config`] - Engine options loaded from YAML
//! - [`scenario`] - Scripted multi-step runs

pub mod config;
pub mod engine;
pub mod error;
pub mod fieldpath;
pub mod merge;
pub mod scenario;
pub mod store;
pub mod value;


pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, EngineBuilder};
pub use error::EngineError;
pub use fieldpath::{ManagedFieldEntry, ManagedFields, Operation, Path, Set as FieldPathSet};
pub use merge::{Comparison, Conflict, Conflicts, MergeOutcome, Updater, UpdaterBuilder};
pub use store::{Resource, ResourceIdentity, ResourceStore};
pub use value::{Map, Value};
