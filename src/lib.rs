//! # ragkit
//!
//! A local-first retrieval pipeline for RAG: semantic-boundary-aware text
//! chunking, exact vector indexing with normalized similarity search, and
//! score-bounded context assembly.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌─────────────┐
//! │  Loader  │──▶│ Chunker  │──▶│ Embedding │──▶│ VectorIndex │
//! │ (fs scan)│   │          │   │ (Gemini)  │   │ (flat, L2)  │
//! └──────────┘   └──────────┘   └───────────┘   └──────┬──────┘
//!                                                      │
//!                                    ┌─────────────────┤
//!                                    ▼                 ▼
//!                              ┌───────────┐    ┌────────────┐
//!                              │ Retriever │    │ Persistence │
//!                              │ (context) │    │ .vec/.json  │
//!                              └───────────┘    └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragkit ingest                       # chunk + embed + index documents
//! ragkit query "feeding schedule"     # retrieve ranked chunks
//! ragkit stats                        # inspect the store
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`tokens`] | Token-counting strategies |
//! | [`chunker`] | Paragraph/sentence chunking with overlap |
//! | [`index`] | Flat vector index with persistence |
//! | [`embedding`] | Embedding provider with retry and batching |
//! | [`retriever`] | Search orchestration and context assembly |
//! | [`loader`] | Filesystem document loading |
//! | [`ingest`] | Ingest and clear commands |
//! | [`query`] | Query command and result display |
//! | [`stats`] | Store statistics command |

pub mod chunker;
pub mod config;
pub mod embedding;
pub mod index;
pub mod ingest;
pub mod loader;
pub mod models;
pub mod query;
pub mod retriever;
pub mod stats;
pub mod tokens;
