//! Shared domain types for Tabula.
//!
//! This crate contains the types passed between the table manager, its ports,
//! and the CLI: records and record sets, operation options and outcomes,
//! configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, thiserror.

pub mod config;
pub mod error;
pub mod outcome;
pub mod query;
pub mod record;
pub mod schema;
