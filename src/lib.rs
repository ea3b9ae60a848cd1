//! Streaming ingestion and normalization pipeline for healthcare
//! Transparency-in-Coverage (TiC) Machine-Readable Files.
//!
//! A payer publishes a Table-of-Contents index referencing many per-plan
//! rate files; this crate resolves that index, fetches each file, and
//! streams it through a bounded-memory parser that flattens negotiated
//! rates into identified, quality-scored rows, which are then batched into
//! partitioned Parquet artifacts.
//!
//! # Pipeline
//!
//! ```text
//! Fetcher → ToC Resolver → Payer Handler → Streaming Parser
//!   → Record Normalizer → Identity Generator → Quality Validator
//!   → Batch Emitter
//! ```
//!
//! [`orchestrator::Orchestrator`] drives the whole pipeline for a
//! [`config::Config`] of payer endpoints, producing a [`report::RunReport`].

pub mod config;
pub mod emit;
pub mod error;
pub mod fetch;
pub mod handlers;
pub mod identity;
pub mod logging;
pub mod normalize;
pub mod orchestrator;
pub mod quality;
pub mod report;
pub mod streaming;
pub mod toc;
pub mod types;

pub use config::Config;
pub use error::PipelineError;
pub use orchestrator::Orchestrator;
pub use report::RunReport;
