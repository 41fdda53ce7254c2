//! Business-key and upload-name validation
//!
//! Order numbers are 6-digit integers and line numbers lie in `1..=999`.
//! These checks run at the service boundary, before anything reaches the store.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

pub const MIN_ORDER_NUMBER: i64 = 100_000;
pub const MAX_ORDER_NUMBER: i64 = 999_999;
pub const MIN_LINE_NUMBER: i64 = 1;
pub const MAX_LINE_NUMBER: i64 = 999;

/// Fallback used when sanitizing leaves nothing of the original name
pub const DEFAULT_UPLOAD_NAME: &str = "upload";

static UNSAFE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"));

pub fn validate_order(order_number: i64) -> Result<u32> {
    if (MIN_ORDER_NUMBER..=MAX_ORDER_NUMBER).contains(&order_number) {
        Ok(order_number as u32)
    } else {
        Err(Error::Validation(format!(
            "order_number must be a 6-digit number, got {order_number}"
        )))
    }
}

pub fn validate_line(line_number: i64) -> Result<u32> {
    if (MIN_LINE_NUMBER..=MAX_LINE_NUMBER).contains(&line_number) {
        Ok(line_number as u32)
    } else {
        Err(Error::Validation(format!(
            "line_number must be between 1 and 999, got {line_number}"
        )))
    }
}

/// Validate an ordered line list, keeping order and repeats
pub fn validate_lines(lines: &[i64]) -> Result<Vec<u32>> {
    lines.iter().map(|&line| validate_line(line)).collect()
}

/// Parse a comma-separated line list such as `"3, 1,2"`
pub fn parse_line_list(input: &str) -> Result<Vec<u32>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split(',')
        .map(|part| {
            let part = part.trim();
            let value: i64 = part.parse().map_err(|_| {
                Error::Validation(format!("line numbers must be integers, got '{part}'"))
            })?;
            validate_line(value)
        })
        .collect()
}

/// Reduce an uploaded file name to a safe single path component
pub fn sanitize_filename(name: &str) -> String {
    // Keep only the last component of whatever path the client sent
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let replaced = UNSAFE_NAME_CHARS.replace_all(base, "_");
    let cleaned = replaced.trim_start_matches(['.', '_']).trim_end_matches('_');
    if cleaned.is_empty() {
        DEFAULT_UPLOAD_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Lowercased extension of a file name, if any
pub fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// File name without its final extension
pub fn file_stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_bounds() {
        assert_eq!(validate_order(100000).unwrap(), 100000);
        assert_eq!(validate_order(999999).unwrap(), 999999);
        assert!(validate_order(99999).is_err());
        assert!(validate_order(1_000_000).is_err());
        assert!(validate_order(-123456).is_err());
    }

    #[test]
    fn test_line_bounds() {
        assert_eq!(validate_line(1).unwrap(), 1);
        assert_eq!(validate_line(999).unwrap(), 999);
        assert!(matches!(validate_line(0), Err(Error::Validation(_))));
        assert!(validate_line(1000).is_err());
    }

    #[test]
    fn test_parse_line_list_preserves_order_and_repeats() {
        assert_eq!(parse_line_list("3, 1,3").unwrap(), vec![3, 1, 3]);
        assert!(parse_line_list("").unwrap().is_empty());
        assert!(parse_line_list("1,x").is_err());
        assert!(parse_line_list("1,1000").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("drawing.svg"), "drawing.svg");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\tmp\\my file.svg"), "my_file.svg");
        assert_eq!(sanitize_filename(".hidden.svg"), "hidden.svg");
        assert_eq!(sanitize_filename("..."), DEFAULT_UPLOAD_NAME);
        assert_eq!(sanitize_filename("Ünïcode.svg"), "n_code.svg");
    }

    #[test]
    fn test_extension_and_stem() {
        assert_eq!(extension("a.SVG").as_deref(), Some("svg"));
        assert_eq!(extension("noext"), None);
        assert_eq!(extension("dot."), None);
        assert_eq!(file_stem("drawing.svg"), "drawing");
        assert_eq!(file_stem("archive.tar.gz"), "archive.tar");
        assert_eq!(file_stem("noext"), "noext");
    }
}
