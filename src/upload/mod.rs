//! Upload strategies for S3-backed media storage
//!
//! Two interchangeable ways to get bytes into a bucket: a pre-signed PUT URL
//! fed by a plain HTTP client, or a managed transfer driven through the S3 API
//! (single put or multipart). Both resolve each upload exactly once.

pub mod managed;
pub mod mock;
pub mod presigned;
pub mod progress;

pub use managed::TransferManager;
pub use mock::MockUploadStrategy;
pub use presigned::PresignedUploader;
pub use progress::{ProgressReporter, UploadEvent, UploadHandle};

use crate::models::{Config, UploadRequest, UploadResult};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::Client as S3Client;

#[async_trait]
pub trait UploadStrategy: Send + Sync {
    /// Transfer `request` to its bucket, reporting progress along the way.
    async fn upload(
        &self,
        request: UploadRequest,
        progress: &ProgressReporter,
    ) -> Result<UploadResult>;

    fn name(&self) -> &'static str;
}

/// Path-style object URL: `endpoint/bucket/key`.
pub fn object_url(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key)
}

/// Build the S3 client described by `config`.
///
/// Static keys bypass the default credential chain entirely; otherwise the
/// environment/profile/instance chain from `aws-config` is used.
pub async fn build_s3_client(config: &Config) -> Result<S3Client> {
    let region = Region::new(config.region.clone());

    let mut builder = match (&config.access_key_id, &config.secret_access_key) {
        (Some(access_key_id), Some(secret_access_key)) => {
            let credentials = Credentials::new(
                access_key_id.clone(),
                secret_access_key.clone(),
                None,
                None,
                "media-uploader-static",
            );
            aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(credentials)
        }
        (None, None) => {
            let shared = aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .load()
                .await;
            aws_sdk_s3::config::Builder::from(&shared)
        }
        _ => {
            return Err(Error::Config(
                "Access key id and secret access key must be set together".to_string(),
            ))
        }
    };

    if let Some(endpoint) = &config.s3_endpoint {
        builder = builder.endpoint_url(endpoint.clone()).force_path_style(true);
    }

    Ok(S3Client::from_conf(builder.build()))
}
