//! Text embedding port.
//!
//! `Embedder` is the trait implementations provide; `BoxEmbedder` is the
//! type-erased handle the table manager holds.

pub mod box_embedder;
pub mod embedder;

pub use box_embedder::BoxEmbedder;
pub use embedder::Embedder;
