//! Data models and configuration
//!
//! Defines the content classification, upload request/result types and the
//! environment-driven configuration shared by both upload strategies.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Logical kind of uploaded media. Selects MIME type, default extension and bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Image,
    Video,
}

impl ContentKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            ContentKind::Image => "image/jpeg",
            ContentKind::Video => "video/quicktime",
        }
    }

    /// Extension used when the source carries none.
    pub fn default_extension(self) -> &'static str {
        match self {
            ContentKind::Image => "jpeg",
            ContentKind::Video => "MOV",
        }
    }

    /// Best-effort classification of a local file by extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" | "png" | "webp" | "gif" => Some(ContentKind::Image),
            "mov" | "mp4" | "m4v" | "qt" => Some(ContentKind::Video),
            _ => None,
        }
    }
}

impl FromStr for ContentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(ContentKind::Image),
            "video" => Ok(ContentKind::Video),
            other => Err(Error::InvalidInput(format!(
                "Unknown content kind '{}', expected image or video",
                other
            ))),
        }
    }
}

/// Where the bytes of an upload come from.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

impl UploadSource {
    /// Extension of the local file, if this is a file source.
    pub fn extension(&self) -> Option<&str> {
        match self {
            UploadSource::Bytes(_) => None,
            UploadSource::File(path) => crate::keys::extension_of(path),
        }
    }
}

/// A single upload, built per call and consumed by a strategy.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: UploadSource,
    pub kind: ContentKind,
    pub key: String,
    pub bucket: String,
}

/// Successful outcome of an upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResult {
    pub url: String,
    pub key: String,
    pub kind: ContentKind,
}

/// Which upload strategy the uploader is wired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Presigned,
    Managed,
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "presigned" => Ok(StrategyKind::Presigned),
            "managed" => Ok(StrategyKind::Managed),
            other => Err(Error::Config(format!(
                "Unknown upload strategy '{}', expected presigned or managed",
                other
            ))),
        }
    }
}

pub const DEFAULT_REGION: &str = "us-west-1";
pub const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 3600;
/// SigV4 pre-signed URLs cannot outlive one week.
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
pub const DEFAULT_MULTIPART_THRESHOLD: usize = 8 * 1024 * 1024;
/// S3 rejects multipart parts smaller than this (except the last one).
pub const MIN_MULTIPART_PART_SIZE: usize = 5 * 1024 * 1024;

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub region: String,
    pub s3_endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub image_bucket: String,
    pub video_bucket: String,
    pub images_cdn: String,
    pub videos_cdn: String,
    pub thumbnails_cdn: String,
    pub strategy: StrategyKind,
    pub presign_expiry_secs: u64,
    pub multipart_threshold: usize,
    pub ffmpeg_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{} not set", name)))
        };
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let access_key_id = optional("MEDIA_ACCESS_KEY_ID");
        let secret_access_key = optional("MEDIA_SECRET_ACCESS_KEY");
        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(Error::Config(
                "MEDIA_ACCESS_KEY_ID and MEDIA_SECRET_ACCESS_KEY must be set together".to_string(),
            ));
        }

        let strategy = match optional("MEDIA_UPLOAD_STRATEGY") {
            Some(value) => value.parse()?,
            None => StrategyKind::Managed,
        };

        let presign_expiry_secs = match optional("MEDIA_PRESIGN_EXPIRY_SECS") {
            Some(value) => value.parse().map_err(|_| {
                Error::Config(format!("Invalid MEDIA_PRESIGN_EXPIRY_SECS '{}'", value))
            })?,
            None => DEFAULT_PRESIGN_EXPIRY_SECS,
        };
        if !(1..=MAX_PRESIGN_EXPIRY_SECS).contains(&presign_expiry_secs) {
            return Err(Error::Config(format!(
                "MEDIA_PRESIGN_EXPIRY_SECS must be between 1 and {} seconds",
                MAX_PRESIGN_EXPIRY_SECS
            )));
        }

        let multipart_threshold = match optional("MEDIA_MULTIPART_THRESHOLD") {
            Some(value) => value.parse().map_err(|_| {
                Error::Config(format!("Invalid MEDIA_MULTIPART_THRESHOLD '{}'", value))
            })?,
            None => DEFAULT_MULTIPART_THRESHOLD,
        };
        if multipart_threshold < MIN_MULTIPART_PART_SIZE {
            return Err(Error::Config(format!(
                "MEDIA_MULTIPART_THRESHOLD must be at least {} bytes",
                MIN_MULTIPART_PART_SIZE
            )));
        }

        Ok(Self {
            region: optional("MEDIA_AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            s3_endpoint: optional("MEDIA_S3_ENDPOINT"),
            access_key_id,
            secret_access_key,
            image_bucket: required("MEDIA_IMAGE_BUCKET")?,
            video_bucket: required("MEDIA_VIDEO_BUCKET")?,
            images_cdn: required("MEDIA_IMAGES_CDN")?,
            videos_cdn: required("MEDIA_VIDEOS_CDN")?,
            thumbnails_cdn: required("MEDIA_THUMBNAILS_CDN")?,
            strategy,
            presign_expiry_secs,
            multipart_threshold,
            ffmpeg_path: Self::ffmpeg_path_from_vars(&lookup),
        })
    }

    /// `ffmpeg` binary to run, without requiring the rest of the configuration.
    pub fn ffmpeg_path_from_env() -> String {
        dotenvy::dotenv().ok();
        Self::ffmpeg_path_from_vars(|name| std::env::var(name).ok())
    }

    pub fn ffmpeg_path_from_vars<F>(lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup("MEDIA_FFMPEG_PATH")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FFMPEG_PATH.to_string())
    }

    pub fn bucket_for(&self, kind: ContentKind) -> &str {
        match kind {
            ContentKind::Image => &self.image_bucket,
            ContentKind::Video => &self.video_bucket,
        }
    }

    /// Base endpoint of the storage service, without a trailing slash.
    pub fn storage_endpoint(&self) -> String {
        match &self.s3_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://s3.{}.amazonaws.com", self.region),
        }
    }

    /// Path-style object URL: `endpoint/bucket/key`.
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        crate::upload::object_url(&self.storage_endpoint(), bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("MEDIA_IMAGE_BUCKET", "app-images"),
            ("MEDIA_VIDEO_BUCKET", "app-videos"),
            ("MEDIA_IMAGES_CDN", "https://img.cdn.test/"),
            ("MEDIA_VIDEOS_CDN", "https://vid.cdn.test/"),
            ("MEDIA_THUMBNAILS_CDN", "https://thumb.cdn.test/"),
        ])
    }

    fn config_from(vars: &HashMap<&'static str, &'static str>) -> Result<Config> {
        Config::from_vars(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_content_kind_mime_and_extension() {
        assert_eq!(ContentKind::Image.mime_type(), "image/jpeg");
        assert_eq!(ContentKind::Video.mime_type(), "video/quicktime");
        assert_eq!(ContentKind::Image.default_extension(), "jpeg");
        assert_eq!(ContentKind::Video.default_extension(), "MOV");
    }

    #[test]
    fn test_content_kind_from_extension() {
        assert_eq!(ContentKind::from_extension("JPG"), Some(ContentKind::Image));
        assert_eq!(ContentKind::from_extension("mov"), Some(ContentKind::Video));
        assert_eq!(ContentKind::from_extension("txt"), None);
    }

    #[test]
    fn test_content_kind_serialization() {
        let json = serde_json::to_string(&ContentKind::Video).unwrap();
        assert_eq!(json, "\"video\"");
        assert_eq!("IMAGE".parse::<ContentKind>().unwrap(), ContentKind::Image);
        assert!("audio".parse::<ContentKind>().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = config_from(&base_vars()).unwrap();

        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.strategy, StrategyKind::Managed);
        assert_eq!(config.presign_expiry_secs, 3600);
        assert_eq!(config.multipart_threshold, DEFAULT_MULTIPART_THRESHOLD);
        assert_eq!(config.ffmpeg_path, "ffmpeg");
        assert_eq!(config.bucket_for(ContentKind::Image), "app-images");
        assert_eq!(config.bucket_for(ContentKind::Video), "app-videos");
    }

    #[test]
    fn test_config_missing_bucket() {
        let mut vars = base_vars();
        vars.remove("MEDIA_VIDEO_BUCKET");

        let err = config_from(&vars).unwrap_err();
        assert!(err.to_string().contains("MEDIA_VIDEO_BUCKET"));
    }

    #[test]
    fn test_config_rejects_half_credentials() {
        let mut vars = base_vars();
        vars.insert("MEDIA_ACCESS_KEY_ID", "AKIDEXAMPLE");

        assert!(matches!(config_from(&vars), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_rejects_small_multipart_threshold() {
        let mut vars = base_vars();
        vars.insert("MEDIA_MULTIPART_THRESHOLD", "1024");

        assert!(matches!(config_from(&vars), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_rejects_out_of_range_presign_expiry() {
        for value in ["0", "604801", "999999999"] {
            let mut vars = base_vars();
            vars.insert("MEDIA_PRESIGN_EXPIRY_SECS", value);

            let err = config_from(&vars).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "accepted expiry {}", value);
        }

        let mut vars = base_vars();
        vars.insert("MEDIA_PRESIGN_EXPIRY_SECS", "604800");
        assert_eq!(config_from(&vars).unwrap().presign_expiry_secs, MAX_PRESIGN_EXPIRY_SECS);
    }

    #[test]
    fn test_ffmpeg_path_needs_no_other_variables() {
        assert_eq!(Config::ffmpeg_path_from_vars(|_| None), DEFAULT_FFMPEG_PATH);
        assert_eq!(
            Config::ffmpeg_path_from_vars(|name| {
                (name == "MEDIA_FFMPEG_PATH").then(|| "/opt/bin/ffmpeg".to_string())
            }),
            "/opt/bin/ffmpeg"
        );
    }

    #[test]
    fn test_object_url_uses_custom_endpoint() {
        let mut vars = base_vars();
        vars.insert("MEDIA_S3_ENDPOINT", "http://localhost:9000/");
        vars.insert("MEDIA_UPLOAD_STRATEGY", "presigned");
        let config = config_from(&vars).unwrap();

        assert_eq!(config.strategy, StrategyKind::Presigned);
        assert_eq!(
            config.object_url("app-images", "A.jpeg"),
            "http://localhost:9000/app-images/A.jpeg"
        );
    }

    #[test]
    fn test_object_url_defaults_to_regional_endpoint() {
        let config = config_from(&base_vars()).unwrap();
        assert_eq!(
            config.object_url("app-videos", "B.MOV"),
            "https://s3.us-west-1.amazonaws.com/app-videos/B.MOV"
        );
    }
}
