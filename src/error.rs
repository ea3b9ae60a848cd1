//! Unified error taxonomy for the ingestion pipeline.
//!
//! Mirrors the propagation rules: fetch errors retry internally and surface
//! only after exhaustion, parse errors are per-file fatal but leave partial
//! batches intact, sink errors are batch-retryable then file-fatal. Nothing
//! but `ConfigError` is allowed to cross the run boundary.

use thiserror::Error;

/// Errors raised while loading or validating the pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors raised while fetching bytes over HTTP.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("permanent HTTP error: {status} for {url}")]
    Permanent { status: u16, url: String },

    #[error("exhausted retries fetching {url}: {source}")]
    Transient {
        url: String,
        #[source]
        source: Box<FetchError>,
    },
}

/// Result type alias used by the Fetcher.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors raised by the Table-of-Contents Resolver.
#[derive(Debug, Error)]
pub enum TocError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("could not parse index JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("index document does not match any known shape (expected one of reporting_structure, blobs, in_network_files)")]
    UnknownIndexShape,
}

/// Errors raised while streaming-parsing an in-network rate file.
///
/// Malformed sub-records are converted to a silent `RecordSkip` (tracked via
/// a counter, not this enum) wherever possible; this type is reserved for
/// structural corruption that prevents further advancement through the
/// document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected document shape: {0}")]
    Structural(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Errors raised by the Batch Emitter's sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error writing batch: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet encoding error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("upload failed after retries: {0}")]
    UploadExhausted(String),
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Top-level error that can cross a per-payer or per-file boundary. The
/// Orchestrator catches everything else and records it in the run report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("payer index resolution failed: {0}")]
    Toc(#[from] TocError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}
