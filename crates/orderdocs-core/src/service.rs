//! `OrderDocs`: the operations exposed to outer surfaces
//!
//! Identifiers arrive as raw integers and are validated here, before any
//! store call. Everything below this layer works with validated `u32` keys.

use crate::blob::{BlobStore, FsBlobStore};
use crate::config::{Config, StoragePaths};
use crate::convert::Converter;
use crate::error::{Error, Result};
use crate::ingest::{self, Upload, UploadLimits, UploadOutcome};
use crate::keys::{validate_line, validate_lines, validate_order};
use crate::merge::{self, MergePreview};
use crate::model::{ArtifactRecord, MergedArtifactRecord, StoreStats};
use crate::plan::{self, MergePlan, MergeRequest};
use crate::storage::DB;
use crate::summary::{self, OrderSummary};
use std::sync::Arc;

pub const MAX_PER_PAGE: i64 = 500;

/// Which stored bytes of a version to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Source,
    Derived,
}

fn validate_sequence(sequence: i64) -> Result<u32> {
    u32::try_from(sequence)
        .ok()
        .filter(|&s| s >= 1)
        .ok_or_else(|| {
            Error::Validation(format!(
                "sequence_number must be a positive integer, got {sequence}"
            ))
        })
}

fn page_bounds(page: i64, per_page: i64) -> Result<(usize, usize)> {
    if page < 1 {
        return Err(Error::Validation(format!("page must be at least 1, got {page}")));
    }
    if !(1..=MAX_PER_PAGE).contains(&per_page) {
        return Err(Error::Validation(format!(
            "per_page must be between 1 and {MAX_PER_PAGE}, got {per_page}"
        )));
    }
    let offset = (page - 1)
        .checked_mul(per_page)
        .and_then(|offset| usize::try_from(offset).ok())
        .ok_or_else(|| Error::Validation(format!("page {page} is out of range")))?;
    Ok((per_page as usize, offset))
}

fn merge_request(lines: Option<&[i64]>) -> Result<MergeRequest> {
    let lines = lines.map(validate_lines).transpose()?;
    Ok(MergeRequest::from_lines(lines))
}

pub struct OrderDocs {
    db: DB,
    blobs: Arc<dyn BlobStore>,
    converter: Box<dyn Converter>,
    limits: UploadLimits,
    allow_duplicate: bool,
}

impl OrderDocs {
    pub fn new(db: DB, blobs: Arc<dyn BlobStore>, converter: Box<dyn Converter>) -> Self {
        Self {
            db,
            blobs,
            converter,
            limits: UploadLimits::default(),
            allow_duplicate: true,
        }
    }

    /// Open the file-backed store and blob directory described by `config`
    pub fn open(config: &Config, paths: &StoragePaths) -> Result<Self> {
        let db = DB::new(&paths.database)?;
        let blobs = FsBlobStore::new(&paths.blob_root)?;
        Ok(Self::new(db, Arc::new(blobs), config.converter()?)
            .with_limits(config.upload_limits())
            .with_allow_duplicate(config.allow_duplicate()))
    }

    pub fn with_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_allow_duplicate(mut self, allow_duplicate: bool) -> Self {
        self.allow_duplicate = allow_duplicate;
        self
    }

    pub fn db(&self) -> &DB {
        &self.db
    }

    pub fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    // --- Uploads ---

    pub fn upload(
        &self,
        order_number: i64,
        line_number: i64,
        file_name: &str,
        bytes: &[u8],
        allow_duplicate: Option<bool>,
    ) -> Result<UploadOutcome> {
        let upload = Upload {
            order_number: validate_order(order_number)?,
            line_number: validate_line(line_number)?,
            file_name,
            bytes,
            allow_duplicate: allow_duplicate.unwrap_or(self.allow_duplicate),
        };
        ingest::upload(
            &self.db,
            self.blobs(),
            self.converter.as_ref(),
            &self.limits,
            &upload,
        )
    }

    // --- Version queries ---

    pub fn get_latest(&self, order_number: i64, line_number: i64) -> Result<ArtifactRecord> {
        let (order, line) = (validate_order(order_number)?, validate_line(line_number)?);
        self.db
            .get_latest(order, line)?
            .ok_or_else(|| Error::NotFound(format!("no file for order {order}, line {line}")))
    }

    pub fn get_version(
        &self,
        order_number: i64,
        line_number: i64,
        sequence_number: i64,
    ) -> Result<ArtifactRecord> {
        let (order, line) = (validate_order(order_number)?, validate_line(line_number)?);
        let sequence = validate_sequence(sequence_number)?;
        self.db.get_version(order, line, sequence)?.ok_or_else(|| {
            Error::NotFound(format!(
                "no version {sequence} for order {order}, line {line}"
            ))
        })
    }

    /// Latest when `sequence_number` is `None`
    pub fn get_artifact(
        &self,
        order_number: i64,
        line_number: i64,
        sequence_number: Option<i64>,
    ) -> Result<ArtifactRecord> {
        match sequence_number {
            Some(sequence) => self.get_version(order_number, line_number, sequence),
            None => self.get_latest(order_number, line_number),
        }
    }

    /// Every version of the line, ascending; empty when the line has none
    pub fn get_all_versions(&self, order_number: i64, line_number: i64) -> Result<Vec<ArtifactRecord>> {
        let (order, line) = (validate_order(order_number)?, validate_line(line_number)?);
        self.db.get_all_versions(order, line)
    }

    /// Latest version of each line of the order
    pub fn get_by_order(&self, order_number: i64) -> Result<Vec<ArtifactRecord>> {
        self.db.get_by_order(validate_order(order_number)?)
    }

    pub fn summarize(&self, order_number: i64) -> Result<OrderSummary> {
        summary::summarize(&self.db, self.blobs(), validate_order(order_number)?)
    }

    pub fn list_artifacts(&self, page: i64, per_page: i64) -> Result<Vec<ArtifactRecord>> {
        let (limit, offset) = page_bounds(page, per_page)?;
        self.db.list_artifacts(limit, offset)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.db.stats()
    }

    /// Stored bytes of one version
    pub fn read_artifact(
        &self,
        order_number: i64,
        line_number: i64,
        sequence_number: Option<i64>,
        kind: ArtifactKind,
    ) -> Result<(ArtifactRecord, Vec<u8>)> {
        let record = self.get_artifact(order_number, line_number, sequence_number)?;
        let path = match kind {
            ArtifactKind::Source => record.source_path.clone(),
            ArtifactKind::Derived => record.derived_path.clone().ok_or_else(|| {
                Error::NotFound(format!(
                    "no PDF for order {}, line {}, version {} (status {})",
                    record.order_number, record.line_number, record.sequence_number, record.status
                ))
            })?,
        };
        let bytes = self.blobs.retrieve_file(&path)?;
        Ok((record, bytes))
    }

    // --- Merging ---

    /// Resolve a merge request without validating documents
    pub fn plan(&self, order_number: i64, lines: Option<&[i64]>) -> Result<MergePlan> {
        let order = validate_order(order_number)?;
        let request = merge_request(lines)?;
        let summary = summary::summarize(&self.db, self.blobs(), order)?;
        plan::plan(&summary, &request)
    }

    /// Merge the requested lines (all available when `None` or empty)
    pub fn request_merge(
        &self,
        order_number: i64,
        lines: Option<&[i64]>,
    ) -> Result<MergedArtifactRecord> {
        let plan = self.plan(order_number, lines)?;
        merge::execute(&self.db, self.blobs(), &plan)
    }

    /// What [`OrderDocs::request_merge`] would produce; writes nothing
    pub fn request_preview(&self, order_number: i64, lines: Option<&[i64]>) -> Result<MergePreview> {
        let plan = self.plan(order_number, lines)?;
        merge::preview(self.blobs(), &plan)
    }

    /// A merged version, or the latest when `sequence_number` is `None`
    pub fn get_merged(
        &self,
        order_number: i64,
        sequence_number: Option<i64>,
    ) -> Result<MergedArtifactRecord> {
        let order = validate_order(order_number)?;
        let sequence = sequence_number.map(validate_sequence).transpose()?;
        self.db.get_merged(order, sequence)?.ok_or_else(|| match sequence {
            Some(sequence) => {
                Error::NotFound(format!("no merged version {sequence} for order {order}"))
            }
            None => Error::NotFound(format!("no merged PDF for order {order}")),
        })
    }

    pub fn get_all_merged(&self, order_number: i64) -> Result<Vec<MergedArtifactRecord>> {
        self.db.get_all_merged(validate_order(order_number)?)
    }

    pub fn list_merged(&self, page: i64, per_page: i64) -> Result<Vec<MergedArtifactRecord>> {
        let (limit, offset) = page_bounds(page, per_page)?;
        self.db.list_merged(limit, offset)
    }

    pub fn read_merged(
        &self,
        order_number: i64,
        sequence_number: Option<i64>,
    ) -> Result<(MergedArtifactRecord, Vec<u8>)> {
        let record = self.get_merged(order_number, sequence_number)?;
        let bytes = self.blobs.retrieve_file(&record.output_path)?;
        Ok((record, bytes))
    }
}
