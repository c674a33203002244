//! # loglens
//!
//! Duplicate detection for integration error logs. A raw log is compared
//! against a corpus of logs already filed as tickets, and the service answers
//! with the tickets most likely to describe the same failure.
//!
//! ## Pipeline
//!
//! ```text
//!        ┌──────────────┐
//!        │   Raw log    │  ordered key-value records
//!        └──────┬───────┘
//!               ▼
//!   ┌──────────────────────┐
//!   │  Normalize (LLM)     │  flow / trigger / error code / summary
//!   └──────────┬───────────┘
//!              ▼
//!   ┌──────────────────────┐
//!   │  Embed               │
//!   └──────────┬───────────┘
//!              ▼
//!   ┌──────────────────────┐
//!   │  Vector search top N │  cosine distance
//!   └──────────┬───────────┘
//!              ▼
//!   ┌──────────────────────┐
//!   │  Format              │  similarity % = (1 - distance) × 100
//!   │                      │  summary cut at 150 chars
//!   └──────────┬───────────┘
//!              ▼
//!   ┌──────────────────────┐
//!   │  LLM re-rank         │  rank / classification / confidence
//!   │  (falls back to      │  merged by full or short ticket id
//!   │   similarity order)  │
//!   └──────────┬───────────┘
//!              ▼
//!        ┌──────────────┐
//!        │ Top N result │
//!        └──────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, data dir, LLM and pipeline
//! - [`models`] - Shared data types: `NormalizedLog`, `Candidate`, re-rank entries, requests
//! - [`llm::generate`] - JSON-schema constrained generation via Ollama, OpenAI-compatible or Gemini
//! - [`llm::normalize`] - LLM-backed log normalization
//! - [`llm::embeddings`] - Embedding generation
//! - [`llm::rerank`] - Re-rank merge with fallback to similarity order
//! - [`search::vector`] - Persisted corpus of known logs with cosine distance search
//! - [`search::format`] - Distance to similarity conversion and summary truncation
//! - [`search::pipeline`] - The search and ingest pipelines
//! - [`api`] - Axum handlers
//! - [`state`] - Shared application state

pub mod api;
pub mod config;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
