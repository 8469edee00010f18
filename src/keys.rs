//! Object key generation.
//!
//! Keys are a random UUID followed by the source file's extension, or the
//! content kind's default extension when the source has none.

use crate::models::ContentKind;
use std::path::Path;
use uuid::Uuid;

/// Generate a unique object key for an upload of `kind`.
pub fn unique_key(kind: ContentKind, source_extension: Option<&str>) -> String {
    let ext = source_extension
        .map(|ext| ext.trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| kind.default_extension());

    let id = Uuid::new_v4().hyphenated().to_string().to_uppercase();
    format!("{}.{}", id, ext)
}

/// Extension of a local file path, if any.
pub fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_extension_per_kind() {
        assert!(unique_key(ContentKind::Image, None).ends_with(".jpeg"));
        assert!(unique_key(ContentKind::Video, None).ends_with(".MOV"));
    }

    #[test]
    fn test_preserves_source_extension() {
        assert!(unique_key(ContentKind::Video, Some("mp4")).ends_with(".mp4"));
        assert!(unique_key(ContentKind::Image, Some(".png")).ends_with(".png"));
    }

    #[test]
    fn test_empty_extension_falls_back_to_default() {
        assert!(unique_key(ContentKind::Image, Some("")).ends_with(".jpeg"));
        assert!(unique_key(ContentKind::Video, Some(".")).ends_with(".MOV"));
    }

    #[test]
    fn test_keys_are_unique() {
        let keys: HashSet<String> = (0..1000)
            .map(|_| unique_key(ContentKind::Image, None))
            .collect();
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("/tmp/clip.mov")), Some("mov"));
        assert_eq!(extension_of(Path::new("/tmp/noext")), None);
    }
}
