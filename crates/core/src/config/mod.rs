//! Configuration loading and schema definitions
//!
//! Shared configuration types used by every binary.

mod loader;
#[allow(missing_docs)]
mod schema;

pub use loader::{expand_path, Config, CONFIG_CANDIDATES};
pub use schema::*;
