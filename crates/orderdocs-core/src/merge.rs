//! Merge execution and preview
//!
//! Execution validates every planned source before anything is written. The
//! concatenated output is staged under a fresh blob key, then recorded with
//! the next merged sequence for the order. If recording fails the staged blob
//! is removed, so a failed merge leaves neither a record nor a file.

use crate::blob::{self, BlobStore};
use crate::document::{self, ValidatedDocument};
use crate::error::{Error, Result};
use crate::model::{MergedArtifactRecord, NewMergedArtifact};
use crate::plan::{MergePlan, ResolvedSource};
use crate::storage::DB;
use crate::summary::LineInfo;
use rayon::prelude::*;
use serde::Serialize;

/// Validate every source in plan order, failing on the first bad one
fn validate_sources(
    blobs: &dyn BlobStore,
    sources: &[ResolvedSource],
) -> Result<Vec<ValidatedDocument>> {
    sources
        .par_iter()
        .map(|source| {
            document::load_blob(blobs, &source.path).map_err(|e| e.for_line(source.line_number))
        })
        .collect()
}

/// Concatenate the planned sources and record the result
pub fn execute(db: &DB, blobs: &dyn BlobStore, plan: &MergePlan) -> Result<MergedArtifactRecord> {
    let order = plan.order_number;
    if plan.sources.is_empty() {
        return Err(Error::NoAvailableArtifacts(order));
    }

    let documents = validate_sources(blobs, &plan.sources)?;
    let expected_pages: u32 = documents.iter().map(|d| d.page_count).sum();

    let merged = document::concatenate(documents)?;
    if merged.page_count != expected_pages {
        return Err(Error::Document(format!(
            "merged output has {} page(s), sources have {}",
            merged.page_count, expected_pages
        )));
    }

    let output_path = blob::merged_key(order);
    blobs.store_file(&output_path, &merged.bytes)?;

    let new = NewMergedArtifact {
        order_number: order,
        output_path: output_path.clone(),
        size_bytes: merged.bytes.len() as u64,
        included_lines: plan.line_numbers(),
        page_count: merged.page_count,
    };
    match db.insert_next_merged(&new) {
        Ok(record) => {
            tracing::info!(
                "Merged order {} version {}: {} file(s), {} page(s) -> {}",
                order,
                record.sequence_number,
                record.file_count,
                record.page_count,
                record.output_path
            );
            Ok(record)
        }
        Err(e) => {
            tracing::warn!(
                "Recording merge for order {} failed, removing staged output {}",
                order,
                output_path
            );
            if let Err(cleanup) = blobs.delete_file(&output_path) {
                tracing::warn!("Failed to remove {}: {}", output_path, cleanup);
            }
            Err(e)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewEntry {
    pub line_number: u32,
    pub sequence_number: u32,
    pub original_name: String,
    pub page_count: u32,
}

/// What a merge would produce, without producing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergePreview {
    pub order_number: u32,
    pub plan_size: usize,
    pub total_pages: u32,
    pub per_line: Vec<PreviewEntry>,
    pub missing: Vec<LineInfo>,
}

/// Validate and count the planned sources; writes nothing
pub fn preview(blobs: &dyn BlobStore, plan: &MergePlan) -> Result<MergePreview> {
    let documents = validate_sources(blobs, &plan.sources)?;

    let per_line: Vec<PreviewEntry> = plan
        .sources
        .iter()
        .zip(&documents)
        .map(|(source, doc)| PreviewEntry {
            line_number: source.line_number,
            sequence_number: source.sequence_number,
            original_name: source.original_name.clone(),
            page_count: doc.page_count,
        })
        .collect();

    Ok(MergePreview {
        order_number: plan.order_number,
        plan_size: per_line.len(),
        total_pages: per_line.iter().map(|e| e.page_count).sum(),
        per_line,
        missing: plan.missing.clone(),
    })
}
