//! Merge planning: which documents, in what order
//!
//! Two named modes:
//! - [`MergeRequest::AllAvailable`] takes every available line in ascending
//!   order and silently skips missing ones.
//! - [`MergeRequest::Lines`] takes exactly the lines named, in the order
//!   named (repeats included), and fails on the first one that is not available.

use crate::error::{Error, Result};
use crate::summary::{LineInfo, OrderSummary};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeRequest {
    AllAvailable,
    Lines(Vec<u32>),
}

impl MergeRequest {
    /// `None` or an empty list means "all available"
    pub fn from_lines(lines: Option<Vec<u32>>) -> Self {
        match lines {
            Some(lines) if !lines.is_empty() => MergeRequest::Lines(lines),
            _ => MergeRequest::AllAvailable,
        }
    }
}

/// One planned source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSource {
    pub line_number: u32,
    pub sequence_number: u32,
    pub original_name: String,
    /// Blob key of the derived document
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergePlan {
    pub order_number: u32,
    pub sources: Vec<ResolvedSource>,
    /// Lines of the order that had nothing available at planning time
    pub missing: Vec<LineInfo>,
}

impl MergePlan {
    pub fn line_numbers(&self) -> Vec<u32> {
        self.sources.iter().map(|s| s.line_number).collect()
    }
}

fn resolve(info: &LineInfo) -> Option<ResolvedSource> {
    Some(ResolvedSource {
        line_number: info.line_number,
        sequence_number: info.sequence_number,
        original_name: info.original_name.clone(),
        path: info.derived_path.clone()?,
    })
}

/// Resolve a merge request against an order summary
pub fn plan(summary: &OrderSummary, request: &MergeRequest) -> Result<MergePlan> {
    let order = summary.order_number;
    if summary.is_empty() {
        return Err(Error::EmptyOrder(order));
    }

    let sources = match request {
        MergeRequest::AllAvailable => {
            if summary.available.is_empty() {
                return Err(Error::NoAvailableArtifacts(order));
            }
            summary.available.iter().filter_map(resolve).collect()
        }
        MergeRequest::Lines(lines) => lines
            .iter()
            .map(|&line| {
                summary
                    .available_line(line)
                    .and_then(resolve)
                    .ok_or(Error::UnresolvedLine { order, line })
            })
            .collect::<Result<Vec<_>>>()?,
    };

    tracing::debug!(
        "Planned merge for order {}: lines {:?}",
        order,
        sources.iter().map(|s| s.line_number).collect::<Vec<_>>()
    );
    Ok(MergePlan {
        order_number: order,
        sources,
        missing: summary.missing.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArtifactStatus;

    fn line(line_number: u32, derived: bool) -> LineInfo {
        LineInfo {
            line_number,
            sequence_number: 1,
            original_name: format!("line{line_number}.svg"),
            status: if derived {
                ArtifactStatus::Converted
            } else {
                ArtifactStatus::Uploaded
            },
            derived_path: derived.then(|| format!("converted/{line_number}.pdf")),
            created_at: 0,
        }
    }

    /// Order 123456 with lines 1 and 3 available and line 2 missing
    fn summary() -> OrderSummary {
        OrderSummary {
            order_number: 123456,
            total_lines: 3,
            available: vec![line(1, true), line(3, true)],
            missing: vec![line(2, false)],
        }
    }

    #[test]
    fn test_all_available_skips_missing() {
        let plan = plan(&summary(), &MergeRequest::AllAvailable).unwrap();
        assert_eq!(plan.line_numbers(), vec![1, 3]);
        assert_eq!(plan.missing.len(), 1);
        assert_eq!(plan.sources[1].path, "converted/3.pdf");
    }

    #[test]
    fn test_specific_lines_keep_caller_order() {
        let plan = plan(&summary(), &MergeRequest::Lines(vec![3, 1])).unwrap();
        assert_eq!(plan.line_numbers(), vec![3, 1]);
    }

    #[test]
    fn test_specific_lines_keep_repeats() {
        let plan = plan(&summary(), &MergeRequest::Lines(vec![1, 3, 1])).unwrap();
        assert_eq!(plan.line_numbers(), vec![1, 3, 1]);
    }

    #[test]
    fn test_unavailable_line_fails_whole_plan() {
        let err = plan(&summary(), &MergeRequest::Lines(vec![1, 2])).unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvedLine {
                order: 123456,
                line: 2
            }
        ));

        // Unknown lines fail the same way
        let err = plan(&summary(), &MergeRequest::Lines(vec![7])).unwrap_err();
        assert!(matches!(err, Error::UnresolvedLine { line: 7, .. }));
    }

    #[test]
    fn test_empty_order() {
        let empty = OrderSummary {
            order_number: 123456,
            total_lines: 0,
            available: Vec::new(),
            missing: Vec::new(),
        };
        assert!(matches!(
            plan(&empty, &MergeRequest::AllAvailable),
            Err(Error::EmptyOrder(123456))
        ));
        assert!(matches!(
            plan(&empty, &MergeRequest::Lines(vec![1])),
            Err(Error::EmptyOrder(123456))
        ));
    }

    #[test]
    fn test_nothing_available() {
        let none = OrderSummary {
            order_number: 123456,
            total_lines: 2,
            available: Vec::new(),
            missing: vec![line(1, false), line(2, false)],
        };
        assert!(matches!(
            plan(&none, &MergeRequest::AllAvailable),
            Err(Error::NoAvailableArtifacts(123456))
        ));
        // Specific mode reports the first requested line instead
        assert!(matches!(
            plan(&none, &MergeRequest::Lines(vec![2, 1])),
            Err(Error::UnresolvedLine { line: 2, .. })
        ));
    }

    #[test]
    fn test_empty_line_list_means_all_available() {
        assert_eq!(
            MergeRequest::from_lines(Some(Vec::new())),
            MergeRequest::AllAvailable
        );
        assert_eq!(MergeRequest::from_lines(None), MergeRequest::AllAvailable);
        assert_eq!(
            MergeRequest::from_lines(Some(vec![2])),
            MergeRequest::Lines(vec![2])
        );
    }
}
