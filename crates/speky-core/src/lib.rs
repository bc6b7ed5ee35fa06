//! # speky-core
//!
//! The traceability graph behind Speky.
//!
//! Requirements, tests and comments are loaded from decoded documents into a
//! [`Specification`], an in-memory graph with every relation indexed at
//! insertion time. Once loading is done the graph is checked for dangling
//! references by the [`Validator`] and then only read.
//!
//! ## Constraints
//!
//! - No I/O: callers decode files and hand over `serde_yaml::Value` documents
//!   or comment rows
//! - No logging: loader findings come back as values in a [`LoadReport`]
//! - No async, no network dependencies
//! - All maps are `BTreeMap`, so every listing is deterministic

// =============================================================================
// MODULES
// =============================================================================

pub mod loader;
pub mod specification;
pub mod types;
pub mod validator;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use loader::{DocumentKind, LoadReport, Loader};
pub use specification::Specification;
pub use types::{
    Comment, FieldContract, ItemKind, Requirement, SpecItem, SpekyError, Step, Test,
};
pub use validator::Validator;
