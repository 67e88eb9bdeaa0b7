//! Object-key arithmetic shared by the tree and both transports
//!
//! Keys are bucket-relative S3-style strings (`alice/sub/b.txt`). Folder
//! nodes never carry a trailing slash except for mapping roots (`alice/`).

use crate::{Error, Result};

/// Append one segment to a parent key without doubling the separator
pub fn join(parent: &str, segment: &str) -> String {
    if parent.is_empty() || parent.ends_with('/') {
        format!("{}{}", parent, segment)
    } else {
        format!("{}/{}", parent, segment)
    }
}

/// Last path segment of a key (`alice/sub/b.txt` -> `b.txt`)
pub fn filename(key: &str) -> &str {
    let trimmed = key.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Everything before the last segment, without a trailing slash
pub fn parent_key(key: &str) -> &str {
    let trimmed = key.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}

/// Reject names that would escape or split a single path segment
pub fn validate_filename(name: &str) -> Result<()> {
    if name.is_empty() || name.trim().is_empty() {
        return Err(Error::invalid_name("file name is empty"));
    }
    if name == "." || name == ".." {
        return Err(Error::invalid_name(format!("{} is reserved", name)));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(Error::invalid_name(format!(
            "{} must not contain path separators",
            name
        )));
    }
    Ok(())
}

/// Destination key for a file uploaded into `parent_key`
pub fn upload_key(parent_key: &str, file_name: &str) -> Result<String> {
    validate_filename(file_name)?;
    Ok(join(parent_key, file_name))
}

/// Key of `full_key` after its base name is replaced by `new_name`.
///
/// Only the last segment changes, so a file name that also appears as a
/// folder name higher up the path is left alone there.
pub fn renamed_key(full_key: &str, new_name: &str) -> Result<String> {
    validate_filename(new_name)?;
    let current = filename(full_key);
    if current == new_name {
        return Err(Error::invalid_name(format!(
            "proposed and current name are both {}",
            new_name
        )));
    }
    let parent = parent_key(full_key);
    if parent.is_empty() {
        Ok(new_name.to_string())
    } else {
        Ok(format!("{}/{}", parent, new_name))
    }
}

/// Split a relative path into its non-empty segments
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(join("alice", "a.txt"), "alice/a.txt");
        assert_eq!(join("alice/", "a.txt"), "alice/a.txt");
        assert_eq!(join("", "a.txt"), "a.txt");
    }

    #[test]
    fn test_upload_key_with_and_without_trailing_slash() {
        assert_eq!(upload_key("alice", "report.csv").unwrap(), "alice/report.csv");
        assert_eq!(upload_key("alice/", "report.csv").unwrap(), "alice/report.csv");
    }

    #[test]
    fn test_upload_key_rejects_bad_names() {
        assert!(upload_key("alice", "").is_err());
        assert!(upload_key("alice", "..").is_err());
        assert!(upload_key("alice", "sub/evil.txt").is_err());
    }

    #[test]
    fn test_renamed_key() {
        assert_eq!(renamed_key("alice/a.txt", "z.txt").unwrap(), "alice/z.txt");
        assert_eq!(renamed_key("a.txt", "z.txt").unwrap(), "z.txt");
    }

    #[test]
    fn test_renamed_key_only_touches_last_segment() {
        assert_eq!(
            renamed_key("alice/data/data", "data.bak").unwrap(),
            "alice/data/data.bak"
        );
    }

    #[test]
    fn test_renamed_key_same_name() {
        assert!(renamed_key("alice/a.txt", "a.txt").is_err());
    }

    #[test]
    fn test_filename_and_parent() {
        assert_eq!(filename("alice/sub/b.txt"), "b.txt");
        assert_eq!(filename("alice/sub/"), "sub");
        assert_eq!(filename("b.txt"), "b.txt");
        assert_eq!(parent_key("alice/sub/b.txt"), "alice/sub");
        assert_eq!(parent_key("b.txt"), "");
    }

    #[test]
    fn test_segments_drop_empty() {
        assert_eq!(segments("sub//b.txt/"), vec!["sub", "b.txt"]);
        assert!(segments("").is_empty());
    }
}
