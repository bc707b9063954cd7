//! # vaultsearch core
//!
//! The indexing and retrieval engine behind `vsearch`: chunking, the
//! embedding gateway, the chunk store, similarity search, reranking, and
//! snapshots.
//!
//! This crate has no tokio, filesystem or network dependencies. Embedding
//! and completion backends plug in through the traits in [`embedding`];
//! the store is passed into every entry point of [`retriever::Retriever`]
//! by its owner.
//!
//! ```text
//! write:  chunk → gateway → store
//! read:   query → gateway → search → rerank
//! ```

pub mod chunk;
pub mod embedding;
pub mod gateway;
pub mod models;
pub mod preprocess;
pub mod rerank;
pub mod retriever;
pub mod search;
pub mod snapshot;
pub mod store;
