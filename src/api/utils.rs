//! API utility functions
//!
//! Pure, stateless helpers for the upload path, extracted from services.rs
//! so they can be unit tested in isolation.

use crate::api::error::ApiError;

/// Reduce a client-supplied filename to a safe basename: directory
/// components are stripped and anything outside `[A-Za-z0-9._-]` becomes an
/// underscore. Returns None when nothing usable remains.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let basename = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = basename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let meaningful = cleaned.chars().any(|c| c.is_ascii_alphanumeric());
    if meaningful { Some(cleaned) } else { None }
}

/// Lowercased extension of a filename, if it has one
pub fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Validates that body size does not exceed the maximum allowed size
pub fn validate_body_size(data: &[u8], max_size: usize) -> Result<(), ApiError> {
    if data.len() > max_size {
        return Err(ApiError::PayloadTooLarge(data.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(
            sanitize_filename("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_filename("C:\\Users\\me\\cat.jpg").as_deref(),
            Some("cat.jpg")
        );
        assert_eq!(sanitize_filename("plain.png").as_deref(), Some("plain.png"));
    }

    #[test]
    fn test_sanitize_replaces_odd_characters() {
        assert_eq!(
            sanitize_filename("my photo (1).jpg").as_deref(),
            Some("my_photo__1_.jpg")
        );
    }

    #[test]
    fn test_sanitize_rejects_unusable_names() {
        assert!(sanitize_filename("").is_none());
        assert!(sanitize_filename("...").is_none());
        assert!(sanitize_filename("///").is_none());
        assert!(sanitize_filename("   ").is_none());
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("cat.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
        assert!(extension_of("noext").is_none());
        assert!(extension_of(".hidden").is_none());
        assert!(extension_of("trailing.").is_none());
    }

    #[test]
    fn test_validate_body_size() {
        let data = vec![0u8; 1000];
        assert!(validate_body_size(&data, 1000).is_ok());
        assert!(matches!(
            validate_body_size(&data, 999),
            Err(ApiError::PayloadTooLarge(1000))
        ));
    }
}
