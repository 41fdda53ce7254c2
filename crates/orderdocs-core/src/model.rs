//! Record types owned by the store

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Conversion status of one uploaded version
///
/// `Uploaded` moves exactly once, to `Converted` or `Error`. A retry is a new
/// version, never a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Uploaded,
    Converted,
    Error,
}

impl ArtifactStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactStatus::Uploaded => "uploaded",
            ArtifactStatus::Converted => "converted",
            ArtifactStatus::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ArtifactStatus::Uploaded)
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(ArtifactStatus::Uploaded),
            "converted" => Ok(ArtifactStatus::Converted),
            "error" => Ok(ArtifactStatus::Error),
            other => Err(format!("unknown artifact status '{other}'")),
        }
    }
}

/// One uploaded source artifact and its derived output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: i64,
    pub order_number: u32,
    pub line_number: u32,
    pub sequence_number: u32,
    pub original_name: String,
    pub source_path: String,
    pub derived_path: Option<String>,
    pub status: ArtifactStatus,
    pub size_bytes: u64,
    /// Unix seconds
    pub created_at: i64,
    pub converted_at: Option<i64>,
}

impl ArtifactRecord {
    pub fn has_derived(&self) -> bool {
        self.derived_path.is_some()
    }
}

/// Fields for a new version; the sequence is allocated by the store
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub order_number: u32,
    pub line_number: u32,
    pub original_name: String,
    pub source_path: String,
    pub size_bytes: u64,
}

/// Whether an upload may create a second (or later) version of its key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPolicy {
    AllowNewVersion,
    FirstVersionOnly,
}

impl VersionPolicy {
    pub fn from_allow_duplicate(allow_duplicate: bool) -> Self {
        if allow_duplicate {
            VersionPolicy::AllowNewVersion
        } else {
            VersionPolicy::FirstVersionOnly
        }
    }
}

/// Status of a produced merge. Merged records are written once, complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergedStatus {
    Completed,
}

impl MergedStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MergedStatus::Completed => "completed",
        }
    }
}

impl FromStr for MergedStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(MergedStatus::Completed),
            other => Err(format!("unknown merged status '{other}'")),
        }
    }
}

/// One produced combined output for an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedArtifactRecord {
    pub id: i64,
    pub order_number: u32,
    pub sequence_number: u32,
    pub output_path: String,
    pub size_bytes: u64,
    /// The exact merge order used, repeats included
    pub included_lines: Vec<u32>,
    pub file_count: u32,
    pub page_count: u32,
    pub status: MergedStatus,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewMergedArtifact {
    pub order_number: u32,
    pub output_path: String,
    pub size_bytes: u64,
    pub included_lines: Vec<u32>,
    pub page_count: u32,
}

/// Aggregate counts over every stored version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total: u64,
    pub converted: u64,
    pub pending: u64,
    pub error: u64,
    pub total_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_str() {
        for status in [
            ArtifactStatus::Uploaded,
            ArtifactStatus::Converted,
            ArtifactStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<ArtifactStatus>().unwrap(), status);
        }
        assert!("pending".parse::<ArtifactStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!ArtifactStatus::Uploaded.is_terminal());
        assert!(ArtifactStatus::Converted.is_terminal());
        assert!(ArtifactStatus::Error.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ArtifactStatus::Converted).unwrap();
        assert_eq!(json, "\"converted\"");
    }
}
