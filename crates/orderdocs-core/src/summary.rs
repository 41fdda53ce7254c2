//! Per-order partition of lines into available and missing

use crate::blob::BlobStore;
use crate::error::Result;
use crate::model::{ArtifactRecord, ArtifactStatus};
use crate::storage::DB;
use serde::Serialize;

/// The latest version of one line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineInfo {
    pub line_number: u32,
    pub sequence_number: u32,
    pub original_name: String,
    pub status: ArtifactStatus,
    pub derived_path: Option<String>,
    pub created_at: i64,
}

impl From<&ArtifactRecord> for LineInfo {
    fn from(record: &ArtifactRecord) -> Self {
        Self {
            line_number: record.line_number,
            sequence_number: record.sequence_number,
            original_name: record.original_name.clone(),
            status: record.status,
            derived_path: record.derived_path.clone(),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub order_number: u32,
    pub total_lines: usize,
    /// Lines whose derived document exists in blob storage, ascending
    pub available: Vec<LineInfo>,
    /// Everything else: not yet converted, failed, or dangling, ascending
    pub missing: Vec<LineInfo>,
}

impl OrderSummary {
    pub fn is_empty(&self) -> bool {
        self.total_lines == 0
    }

    pub fn available_line(&self, line_number: u32) -> Option<&LineInfo> {
        self.available
            .iter()
            .find(|info| info.line_number == line_number)
    }
}

/// Summarize the latest version of every line of an order
///
/// An order without records yields an empty summary, not an error.
pub fn summarize(db: &DB, blobs: &dyn BlobStore, order_number: u32) -> Result<OrderSummary> {
    let records = db.get_by_order(order_number)?;

    let mut available = Vec::new();
    let mut missing = Vec::new();
    for record in &records {
        let info = LineInfo::from(record);
        let resolves = record
            .derived_path
            .as_deref()
            .is_some_and(|path| blobs.file_exists(path));
        if resolves {
            available.push(info);
        } else {
            if record.status == ArtifactStatus::Converted {
                tracing::warn!(
                    "Order {} line {} is converted but its document is missing from storage",
                    order_number,
                    record.line_number
                );
            }
            missing.push(info);
        }
    }

    Ok(OrderSummary {
        order_number,
        total_lines: records.len(),
        available,
        missing,
    })
}
