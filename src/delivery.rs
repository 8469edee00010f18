//! CDN delivery URLs for uploaded objects.
//!
//! Images and videos are served from separate CDN bases. Video thumbnails are
//! rendered out-of-band as `<key without extension>-00001.png` under their
//! own base.

use crate::models::{Config, ContentKind};

/// Suffix of the first-frame PNG rendition produced for each video.
pub const THUMBNAIL_SUFFIX: &str = "-00001.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryUrls {
    images_base: String,
    videos_base: String,
    thumbnails_base: String,
}

impl DeliveryUrls {
    pub fn new(images_base: String, videos_base: String, thumbnails_base: String) -> Self {
        Self {
            images_base,
            videos_base,
            thumbnails_base,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.images_cdn.clone(),
            config.videos_cdn.clone(),
            config.thumbnails_cdn.clone(),
        )
    }

    /// CDN URL for a key whose kind is known.
    pub fn url_for(&self, key: &str, kind: ContentKind) -> String {
        match kind {
            ContentKind::Image => format!("{}{}", self.images_base, key),
            ContentKind::Video => format!("{}{}", self.videos_base, key),
        }
    }

    /// CDN URL for a bare key: keys containing `.jpeg` are images, everything
    /// else is served from the video base.
    pub fn url_for_key(&self, key: &str) -> String {
        self.url_for(key, Self::guess_kind(key))
    }

    pub fn guess_kind(key: &str) -> ContentKind {
        if key.contains(".jpeg") {
            ContentKind::Image
        } else {
            ContentKind::Video
        }
    }

    pub fn thumbnail_url(&self, key: &str) -> String {
        format!("{}{}", self.thumbnails_base, thumbnail_key(key))
    }
}

/// Key of the thumbnail rendition for a video key.
///
/// The extension (from the last `.`) is replaced by [`THUMBNAIL_SUFFIX`]; a key
/// without an extension keeps its full name.
pub fn thumbnail_key(key: &str) -> String {
    let stem = match key.rfind('.') {
        Some(idx) if idx > 0 => &key[..idx],
        _ => key,
    };
    format!("{}{}", stem, THUMBNAIL_SUFFIX)
}
