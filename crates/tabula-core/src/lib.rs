//! Ports and table planning logic for Tabula.
//!
//! This crate defines the traits the infrastructure layer implements
//! (embedders, credential providers, storage providers) and the pure logic
//! behind the table manager: duplicate-aware insert planning, update
//! predicate generation, pagination and projection, and subset dedup.
//! It depends only on `tabula-types` -- never on `tabula-infra` or any
//! database/IO crate.

pub mod credential;
pub mod embedding;
pub mod storage;
pub mod table;
