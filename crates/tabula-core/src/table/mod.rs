//! Planning logic for table operations.
//!
//! Everything here is pure: the infra layer reads from the engine, hands the
//! data to these planners, and executes the resulting plan.

pub mod dedup;
pub mod insert;
pub mod page;
pub mod update;
