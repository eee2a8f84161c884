//! Identifier validation
//!
//! Pure predicates classifying strings as external item ids (`tt` + at least
//! 7 digits), list ids (`ls` + at least 6 digits) or user ids (`ur` + at least
//! 4 digits). Matching is exact and case-insensitive; accepted ids are stored
//! lowercase.

use crate::error::{CatalogError, CatalogResult};
use once_cell::sync::Lazy;
use regex::Regex;

static ITEM_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^tt\d{7,}$").expect("valid item id pattern"));
static LIST_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^ls\d{6,}$").expect("valid list id pattern"));
static USER_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^ur\d{4,}$").expect("valid user id pattern"));

static LIST_URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/list/(ls\d{6,})").expect("valid list url pattern"));
static USER_URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/user/(ur\d{4,})").expect("valid user url pattern"));

pub fn is_item_id(s: &str) -> bool {
    ITEM_ID_PATTERN.is_match(s)
}

pub fn is_list_id(s: &str) -> bool {
    LIST_ID_PATTERN.is_match(s)
}

pub fn is_user_id(s: &str) -> bool {
    USER_ID_PATTERN.is_match(s)
}

/// Validate and lowercase an item id
pub fn normalize_item_id(s: &str) -> CatalogResult<String> {
    let trimmed = s.trim();
    if is_item_id(trimmed) {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(CatalogError::InvalidIdentifier(format!("item id {:?}", s)))
    }
}

/// Validate and lowercase a list id
pub fn normalize_list_id(s: &str) -> CatalogResult<String> {
    let trimmed = s.trim();
    if is_list_id(trimmed) {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(CatalogError::InvalidIdentifier(format!("list id {:?}", s)))
    }
}

/// List id from a bare id or a list url
pub fn extract_list_id(reference: &str) -> Option<String> {
    let trimmed = reference.trim();
    if is_list_id(trimmed) {
        return Some(trimmed.to_ascii_lowercase());
    }
    LIST_URL_PATTERN
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// User id from a bare id or a user url
pub fn extract_user_id(reference: &str) -> Option<String> {
    let trimmed = reference.trim();
    if is_user_id(trimmed) {
        return Some(trimmed.to_ascii_lowercase());
    }
    USER_URL_PATTERN
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Normalize a batch of item ids, splitting accepted from rejected input
///
/// Accepted ids keep first-occurrence order with duplicates removed.
pub fn partition_item_ids<S: AsRef<str>>(raw: &[S]) -> (Vec<String>, Vec<String>) {
    let mut accepted: Vec<String> = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();

    for value in raw {
        match normalize_item_id(value.as_ref()) {
            Ok(id) => {
                if !accepted.contains(&id) {
                    accepted.push(id);
                }
            }
            Err(_) => rejected.push(value.as_ref().to_string()),
        }
    }

    (accepted, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_boundary_lengths() {
        assert!(is_item_id("tt0000001"));
        assert!(is_item_id("tt12345678"));
        assert!(!is_item_id("tt000001")); // 6 digits
        assert!(!is_item_id("tt"));
        assert!(!is_item_id("ls0000001"));
        assert!(!is_item_id(" tt0000001"));
        assert!(!is_item_id("tt0000001x"));
        assert!(!is_item_id("xtt0000001"));
    }

    #[test]
    fn test_item_id_case_insensitive() {
        assert!(is_item_id("TT0000001"));
        assert_eq!(normalize_item_id(" TT0000001 ").unwrap(), "tt0000001");
    }

    #[test]
    fn test_list_id_boundary_lengths() {
        assert!(is_list_id("ls100001"));
        assert!(is_list_id("LS1234567890"));
        assert!(!is_list_id("ls10001")); // 5 digits
        assert!(!is_list_id("tt100001"));
        assert!(!is_list_id("ls100001/"));
    }

    #[test]
    fn test_normalize_rejects_invalid() {
        assert!(matches!(
            normalize_list_id("list-1"),
            Err(CatalogError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            normalize_item_id(""),
            Err(CatalogError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_extract_list_id_from_url() {
        assert_eq!(
            extract_list_id("https://www.imdb.com/list/LS123456789/?ref_=x"),
            Some("ls123456789".to_string())
        );
        assert_eq!(extract_list_id("ls100001"), Some("ls100001".to_string()));
        assert_eq!(extract_list_id("https://www.imdb.com/chart/top"), None);
    }

    #[test]
    fn test_extract_user_id() {
        assert_eq!(
            extract_user_id("https://www.imdb.com/user/ur0012345/lists"),
            Some("ur0012345".to_string())
        );
        assert_eq!(extract_user_id("UR1234"), Some("ur1234".to_string()));
        assert_eq!(extract_user_id("ur12"), None);
    }

    #[test]
    fn test_partition_item_ids() {
        let (ok, bad) = partition_item_ids(&["tt0000001", "junk", "TT0000001", "tt0000002"]);
        assert_eq!(ok, vec!["tt0000001", "tt0000002"]);
        assert_eq!(bad, vec!["junk"]);
    }
}
