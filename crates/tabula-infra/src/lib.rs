//! Infrastructure layer for Tabula.
//!
//! Contains the LanceDB-backed [`manager::TableDataManager`] and the
//! implementations of the ports defined in `tabula-core`: storage providers,
//! credential providers, and embedders (local fastembed, OpenAI, Azure
//! OpenAI). Arrow conversion between record sets and record batches lives in
//! [`arrow`].

pub mod arrow;
pub mod config;
pub mod credential;
pub mod embedder;
pub mod lance;
pub mod manager;
pub mod schema;
pub mod storage;
