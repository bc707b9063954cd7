//! # vaultsearch
//!
//! Semantic search and question answering over a folder of Markdown notes.
//!
//! Notes are split into heading-aware chunks, embedded through a configured
//! provider (Ollama, OpenAI, or a local fastembed model), and kept in an
//! in-memory store that is persisted as a JSON snapshot. Queries are ranked
//! by cosine similarity with a lexical boost and an optional rerank pass;
//! `ask` feeds the top chunks to a completion model.
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Vault   │──▶│ Chunk+Embed  │──▶│ Memory store │◀──▶ snapshot.json
//! │  *.md    │   │  (gateway)   │   └──────┬───────┘
//! └──────────┘   └──────────────┘          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │ (vsearch)│       │  (axum)  │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`vault`] | Note discovery on disk |
//! | [`embedding`] | Embedding providers (Ollama, OpenAI, local) |
//! | [`completion`] | Completion providers for `ask` |
//! | [`engine`] | Store, retriever, and providers for one process |
//! | [`snapshot`] | Snapshot file and autosave |
//! | [`ingest`] | `index` and `remove` commands |
//! | [`search`] | `search` and `ask` commands |
//! | [`stats`] | `stats` command |
//! | [`server`] | HTTP server |
//!
//! Chunking, scoring, reranking, and the store itself live in
//! `vaultsearch-core`.

pub mod completion;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod ingest;
pub mod search;
pub mod server;
pub mod snapshot;
pub mod stats;
pub mod vault;
