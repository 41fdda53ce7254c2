//! Upload path: store source bytes, allocate a version, convert, record the result
//!
//! A conversion failure is not an upload failure: the version is kept with
//! status `error` and a later upload creates the retry as a new version.

use crate::blob::{self, BlobStore};
use crate::convert::Converter;
use crate::document;
use crate::error::{Error, Result};
use crate::keys;
use crate::model::{ArtifactRecord, NewArtifact, VersionPolicy};
use crate::storage::DB;
use serde::Serialize;

/// 16 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Guards applied to every upload before anything is stored
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_bytes: u64,
    /// Lowercase extensions without the dot
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: vec!["svg".to_string(), "pdf".to_string()],
        }
    }
}

impl UploadLimits {
    /// Check the upload and return its sanitized name
    pub fn check(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        if bytes.is_empty() {
            return Err(Error::Validation("uploaded file is empty".to_string()));
        }
        if bytes.len() as u64 > self.max_bytes {
            return Err(Error::Validation(format!(
                "uploaded file is {} bytes, the limit is {}",
                bytes.len(),
                self.max_bytes
            )));
        }

        let safe_name = keys::sanitize_filename(file_name);
        let allowed = keys::extension(&safe_name)
            .is_some_and(|ext| self.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)));
        if !allowed {
            return Err(Error::Validation(format!(
                "file type not allowed for '{}'; allowed: {}",
                file_name,
                self.allowed_extensions.join(", ")
            )));
        }
        Ok(safe_name)
    }
}

#[derive(Debug, Clone)]
pub struct Upload<'a> {
    pub order_number: u32,
    pub line_number: u32,
    pub file_name: &'a str,
    pub bytes: &'a [u8],
    pub allow_duplicate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    /// The stored version, with its final status
    pub record: ArtifactRecord,
    pub is_duplicate: bool,
    pub pdf_available: bool,
    pub conversion_error: Option<String>,
}

/// Store an upload as a new version and convert it
pub fn upload(
    db: &DB,
    blobs: &dyn BlobStore,
    converter: &dyn Converter,
    limits: &UploadLimits,
    upload: &Upload<'_>,
) -> Result<UploadOutcome> {
    let safe_name = limits.check(upload.file_name, upload.bytes)?;
    let (order, line) = (upload.order_number, upload.line_number);

    // Stage the source under a unique key; the sequence is not known yet
    let source_path = blob::upload_key(order, line, &safe_name);
    blobs.store_file(&source_path, upload.bytes)?;

    let new = NewArtifact {
        order_number: order,
        line_number: line,
        original_name: safe_name.clone(),
        source_path: source_path.clone(),
        size_bytes: upload.bytes.len() as u64,
    };
    let policy = VersionPolicy::from_allow_duplicate(upload.allow_duplicate);
    let record = match db.insert_next_artifact(&new, policy) {
        Ok(record) => record,
        Err(e) => {
            if let Err(cleanup) = blobs.delete_file(&source_path) {
                tracing::warn!("Failed to remove staged upload {}: {}", source_path, cleanup);
            }
            return Err(e);
        }
    };

    let stem = keys::file_stem(&safe_name);
    let derived_path = blob::converted_key(order, line, record.sequence_number, stem);
    let converted = converter
        .convert(upload.bytes)
        .and_then(|pdf| {
            document::validate(&derived_path, &pdf)?;
            Ok(pdf)
        })
        .and_then(|pdf| blobs.store_file(&derived_path, &pdf));

    let conversion_error = match converted {
        Ok(()) => {
            if let Err(e) = db.mark_converted(record.id, &derived_path) {
                if let Err(cleanup) = blobs.delete_file(&derived_path) {
                    tracing::warn!("Failed to remove derived output {}: {}", derived_path, cleanup);
                }
                if let Err(mark) = db.mark_error(record.id) {
                    tracing::warn!("Failed to mark record {} as error: {}", record.id, mark);
                }
                return Err(e);
            }
            tracing::info!(
                "Stored order {} line {} version {} ({})",
                order,
                line,
                record.sequence_number,
                derived_path
            );
            None
        }
        Err(e) => {
            tracing::warn!(
                "Conversion failed for order {} line {} version {}: {}",
                order,
                line,
                record.sequence_number,
                e
            );
            db.mark_error(record.id)?;
            Some(e.to_string())
        }
    };

    let record = db
        .get_artifact(record.id)?
        .ok_or_else(|| Error::NotFound(format!("artifact record {}", record.id)))?;
    Ok(UploadOutcome {
        is_duplicate: record.sequence_number > 1,
        pdf_available: conversion_error.is_none(),
        record,
        conversion_error,
    })
}
