//! orderdocs-core: Versioned order-line document store and PDF merge pipeline
//!
//! This crate provides:
//! - SQLite storage for versioned artifact records with race-free sequence allocation
//! - Per-order summaries of which lines have a usable PDF
//! - Merge planning in two modes (all available, or explicit ordered lines)
//! - PDF validation and concatenation, recorded as versioned merged outputs

pub mod blob;
pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod ingest;
pub mod keys;
pub mod merge;
pub mod model;
pub mod plan;
pub mod service;
pub mod storage;
pub mod summary;

// Re-exports
pub use blob::{BlobStore, FsBlobStore, MemBlobStore};
pub use config::{default_config_path, load_config, Config, StoragePaths};
pub use convert::{CommandConverter, Converter, PassthroughConverter};
pub use document::{concatenate, validate, MergedDocument, ValidatedDocument};
pub use error::{Error, Result};
pub use ingest::{Upload, UploadLimits, UploadOutcome, DEFAULT_MAX_UPLOAD_BYTES};
pub use keys::{parse_line_list, sanitize_filename, validate_line, validate_order};
pub use merge::{MergePreview, PreviewEntry};
pub use model::{
    ArtifactRecord, ArtifactStatus, MergedArtifactRecord, MergedStatus, NewArtifact,
    NewMergedArtifact, StoreStats, VersionPolicy,
};
pub use plan::{MergePlan, MergeRequest, ResolvedSource};
pub use service::{ArtifactKind, OrderDocs};
pub use storage::DB;
pub use summary::{LineInfo, OrderSummary};
