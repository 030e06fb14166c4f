//! # Codebase Assistant Core
//!
//! Pure, I/O-free logic shared by the Codebase Assistant pipeline: the chunk
//! data model, the sentence-boundary chunker, typed metadata filters, the
//! vector-database contract, and the embedding/completion collaborator traits.
//!
//! This crate contains no tokio, sqlx, filesystem, or network code. Concrete
//! collaborators (SQLite vector store, HTTP embedding and completion clients)
//! live in the `codebase-assistant` app crate.

pub mod chunk;
pub mod completion;
pub mod embedding;
pub mod filter;
pub mod models;
pub mod store;
