//! Formtable: filtering, sorting and aggregation for form submission tables.
//!
//! This crate takes submission records decoded against a form schema and
//! derives the visible state of a submissions table from them.
//!
//! # Architecture
//! - Schema and record model (field types, tagged cell values)
//! - Value extraction (comparable, numeric, temporal readings of a cell)
//! - Filter conditions and groups, compiled to closures
//! - Multi-column sort with natural collation
//! - Grouping with count/sum/avg/min/max
//! - Table pipeline with search, column filters and pagination
//! - Saved filter presets and TOML engine configuration

mod types;
mod extract;
mod schema;
mod record;
mod condition;
mod compiler;
mod filter;
mod sort;
mod aggregate;
mod table;
mod presets;
mod config;

pub use types::*;
pub use extract::*;
pub use schema::*;
pub use record::*;
pub use condition::*;
pub use compiler::*;
pub use filter::*;
pub use sort::*;
pub use aggregate::*;
pub use table::*;
pub use presets::*;
pub use config::*;

use thiserror::Error;

/// Unified error type for the boundary operations: decoding, configuration
/// and preset storage. Filtering, sorting and aggregation never fail.
#[derive(Error, Debug)]
pub enum FormtableError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, FormtableError>;
