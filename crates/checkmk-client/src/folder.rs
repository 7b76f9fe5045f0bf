//! Folder identifiers.
//!
//! Checkmk addresses folders in URLs by their path with `~` as the
//! separator: the root `/` is `~`, `/linux/web` is `~linux~web`.  A literal
//! `/` in an object path is rejected by the API.

/// Convert a folder path to its `~`-joined identifier.
///
/// Identifiers that already start with `~` are returned unchanged, so the
/// function is idempotent.
pub fn normalize_folder_id(folder: &str) -> String {
    let trimmed = folder.trim();
    if trimmed.starts_with('~') {
        return trimmed.to_string();
    }
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    format!("~{}", segments.join("~"))
}

/// Whether `folder` is already in identifier form.
pub fn is_folder_id(folder: &str) -> bool {
    folder.trim().starts_with('~')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_becomes_tilde() {
        assert_eq!(normalize_folder_id("/"), "~");
        assert_eq!(normalize_folder_id(""), "~");
    }

    #[test]
    fn nested_path_is_tilde_joined() {
        assert_eq!(normalize_folder_id("/foo/bar"), "~foo~bar");
        assert_eq!(normalize_folder_id("foo/bar/"), "~foo~bar");
        assert_eq!(normalize_folder_id("//foo//bar"), "~foo~bar");
    }

    #[test]
    fn already_normalized_is_unchanged() {
        assert_eq!(normalize_folder_id("~foo"), "~foo");
        assert_eq!(normalize_folder_id("~"), "~");
    }

    #[test]
    fn normalization_is_idempotent() {
        for input in ["/", "/foo/bar", "~foo", "linux", ""] {
            let once = normalize_folder_id(input);
            assert_eq!(normalize_folder_id(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn detects_identifier_form() {
        assert!(is_folder_id("~foo"));
        assert!(!is_folder_id("/foo"));
    }
}
