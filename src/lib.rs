//! # Codebase Assistant
//!
//! Ask natural-language questions about private codebases.
//!
//! Source files are grouped into **projects**. Each project's files are
//! split into sentence-packed chunks, embedded, and stored in a persistent
//! vector collection with rich metadata. Questions are answered by
//! retrieving the nearest chunks (optionally scoped to one project) and
//! asking a chat-completion model to answer from that context alone.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Folder / Git │──▶│ Chunk + Meta │──▶│ Vector store │
//! │   / Upload   │   │   + Embed    │   │ SQLite BLOBs │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │
//!                        ┌─────────────────────┤
//!                        ▼                     ▼
//!                   ┌──────────┐         ┌──────────┐
//!                   │   CLI    │         │   HTTP   │
//!                   │  (cba)   │         │  (axum)  │
//!                   └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cba init
//! cba project create demo --root-path ./src
//! cba ingest folder proj_1234abcd ./src
//! cba ask "How is configuration loaded?" --project proj_1234abcd
//! cba serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | User-visible error taxonomy |
//! | [`context`] | Explicitly-passed application context |
//! | [`metadata`] | Per-file chunk construction with metadata |
//! | [`vector_store`] | Project-aware store adapter |
//! | [`sqlite_store`] | Persistent vector collection |
//! | [`ingest`] | Folder, repository, and file ingestion |
//! | [`registry`] | JSON project registry |
//! | [`projects`] | Project-scoped operations |
//! | [`retrieval`] | Ask and search |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Completion providers |
//! | [`git`] | Git subprocess helpers |
//! | [`server`] | HTTP API |

pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod git;
pub mod ingest;
pub mod llm;
pub mod metadata;
pub mod migrate;
pub mod projects;
pub mod registry;
pub mod retrieval;
pub mod retry;
pub mod server;
pub mod sqlite_store;
pub mod vector_store;
