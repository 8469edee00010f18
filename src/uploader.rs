//! Upload orchestration: key generation, image normalization and strategy dispatch.

use crate::delivery::DeliveryUrls;
use crate::image::normalize_image;
use crate::keys::unique_key;
use crate::models::{Config, ContentKind, StrategyKind, UploadRequest, UploadResult, UploadSource};
use crate::upload::{
    build_s3_client, PresignedUploader, ProgressReporter, TransferManager, UploadHandle,
    UploadStrategy,
};
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Uploads images and videos to their buckets and derives delivery URLs.
///
/// Owns its configuration and strategy; nothing is shared process-wide.
#[derive(Clone)]
pub struct MediaUploader {
    config: Arc<Config>,
    strategy: Arc<dyn UploadStrategy>,
    delivery: DeliveryUrls,
}

impl MediaUploader {
    /// Build an uploader around an explicit strategy.
    ///
    /// This is primarily useful for tests that need to inject mocks.
    pub fn with_strategy(config: Config, strategy: Arc<dyn UploadStrategy>) -> Self {
        let delivery = DeliveryUrls::from_config(&config);
        Self {
            config: Arc::new(config),
            strategy,
            delivery,
        }
    }

    /// Construct an uploader using the strategy selected in `config`.
    pub async fn new(config: Config) -> Result<Self> {
        let client = build_s3_client(&config).await?;

        let strategy: Arc<dyn UploadStrategy> = match config.strategy {
            StrategyKind::Presigned => Arc::new(PresignedUploader::new(client, &config)),
            StrategyKind::Managed => Arc::new(TransferManager::new(client, &config)),
        };
        info!(
            "Upload strategy: {} (region {})",
            strategy.name(),
            config.region
        );

        Ok(Self::with_strategy(config, strategy))
    }

    pub fn delivery(&self) -> &DeliveryUrls {
        &self.delivery
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Generate the key and bucket for an upload of `kind`.
    ///
    /// Images are always stored as JPEG, so their keys take the default extension.
    pub fn prepare(&self, source: UploadSource, kind: ContentKind) -> UploadRequest {
        let key = match kind {
            ContentKind::Image => unique_key(kind, None),
            ContentKind::Video => unique_key(kind, source.extension()),
        };

        UploadRequest {
            source,
            kind,
            key,
            bucket: self.config.bucket_for(kind).to_string(),
        }
    }

    /// Upload `source` as `kind` and resolve once with the result.
    pub async fn upload(
        &self,
        source: UploadSource,
        kind: ContentKind,
        progress: &ProgressReporter,
    ) -> Result<UploadResult> {
        let source = match (kind, source) {
            (ContentKind::Image, UploadSource::Bytes(data)) => {
                UploadSource::Bytes(normalize_image(data).await?)
            }
            (ContentKind::Image, UploadSource::File(path)) => {
                let data = tokio::fs::read(&path).await?;
                UploadSource::Bytes(normalize_image(data).await?)
            }
            (ContentKind::Video, source) => source,
        };

        let request = self.prepare(source, kind);
        let key = request.key.clone();
        info!(
            "Uploading {:?} as {} to bucket {} via {}",
            kind,
            key,
            request.bucket,
            self.strategy.name()
        );

        match self.strategy.upload(request, &progress.scoped()).await {
            Ok(result) => {
                info!("Upload of {} succeeded", result.key);
                Ok(result)
            }
            Err(e) => {
                error!("Upload of {} failed: {}", key, e);
                Err(e)
            }
        }
    }

    pub async fn upload_bytes(
        &self,
        data: Vec<u8>,
        kind: ContentKind,
        progress: &ProgressReporter,
    ) -> Result<UploadResult> {
        self.upload(UploadSource::Bytes(data), kind, progress).await
    }

    pub async fn upload_file(
        &self,
        path: &Path,
        kind: ContentKind,
        progress: &ProgressReporter,
    ) -> Result<UploadResult> {
        self.upload(UploadSource::File(path.to_path_buf()), kind, progress)
            .await
    }

    /// Run an upload on a background task and stream its events.
    pub fn spawn_upload(&self, source: UploadSource, kind: ContentKind) -> UploadHandle {
        let (reporter, events) = ProgressReporter::channel();
        let uploader = self.clone();

        tokio::spawn(async move {
            let result = uploader.upload(source, kind, &reporter).await;
            reporter.complete(result);
        });

        UploadHandle::new(events)
    }

    pub fn spawn_file_upload(&self, path: PathBuf, kind: ContentKind) -> UploadHandle {
        self.spawn_upload(UploadSource::File(path), kind)
    }
}
