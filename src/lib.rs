//! Media uploads to S3 for mobile and CLI clients
//!
//! Uploads images and videos to per-kind buckets through either pre-signed PUT
//! URLs or managed S3 transfers, and derives the CDN URLs the uploaded objects
//! (and their video thumbnails) are served from.

pub mod delivery;
pub mod error;
pub mod image;
pub mod keys;
pub mod models;
pub mod thumbnail;
pub mod upload;
pub mod uploader;

pub use error::{Error, Result};
pub use models::{Config, ContentKind, UploadResult, UploadSource};
pub use uploader::MediaUploader;
