use super::{object_url, ProgressReporter, UploadStrategy};
use crate::models::{Config, ContentKind, UploadRequest, UploadResult, UploadSource};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{ChecksumAlgorithm, CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, warn};

/// Uploads through the S3 API, switching to multipart above a size threshold.
pub struct TransferManager {
    client: S3Client,
    endpoint: String,
    part_size: usize,
}

/// What actually gets sent once staging is done.
enum Payload {
    Buffer(Bytes),
    File(PathBuf),
}

/// Reads a payload one part at a time. Buffer parts are slices of the shared buffer.
enum PartReader {
    Buffer { data: Bytes, offset: usize },
    File(File),
}

impl PartReader {
    async fn open(payload: &Payload) -> Result<Self> {
        Ok(match payload {
            Payload::Buffer(data) => PartReader::Buffer {
                data: data.clone(),
                offset: 0,
            },
            Payload::File(path) => PartReader::File(File::open(path).await?),
        })
    }

    async fn next_part(&mut self, part_size: usize) -> Result<Option<Bytes>> {
        let part = match self {
            PartReader::Buffer { data, offset } => {
                let end = (*offset + part_size).min(data.len());
                let part = data.slice(*offset..end);
                *offset = end;
                part
            }
            PartReader::File(file) => {
                let mut part = Vec::with_capacity(part_size);
                file.take(part_size as u64).read_to_end(&mut part).await?;
                Bytes::from(part)
            }
        };

        Ok(if part.is_empty() { None } else { Some(part) })
    }
}

impl TransferManager {
    pub fn new(client: S3Client, config: &Config) -> Self {
        Self {
            client,
            endpoint: config.storage_endpoint(),
            part_size: config.multipart_threshold,
        }
    }

    /// Shrink the part size below the S3 minimum so tests can exercise multipart.
    #[cfg(test)]
    fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    /// Write in-memory bytes to a temp file so they upload through the file path.
    async fn stage(data: &[u8], key: &str) -> Result<NamedTempFile> {
        let suffix = Path::new(key)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();

        let staged = tempfile::Builder::new()
            .prefix("media-upload-")
            .suffix(&suffix)
            .tempfile()?;
        tokio::fs::write(staged.path(), data).await?;
        debug!("Staged {} bytes at {}", data.len(), staged.path().display());
        Ok(staged)
    }

    async fn payload_len(payload: &Payload) -> Result<u64> {
        Ok(match payload {
            Payload::Buffer(data) => data.len() as u64,
            Payload::File(path) => tokio::fs::metadata(path).await?.len(),
        })
    }

    async fn put_single(&self, request: &UploadRequest, payload: Payload) -> Result<()> {
        let body = match payload {
            Payload::Buffer(data) => ByteStream::from(data),
            Payload::File(path) => ByteStream::from_path(&path)
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e)))?,
        };

        self.client
            .put_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .content_type(request.kind.mime_type())
            .body(body)
            .send()
            .await
            .map_err(|e| Error::S3(format!("Failed to upload {}: {}", request.key, e)))?;

        Ok(())
    }

    async fn put_multipart(
        &self,
        request: &UploadRequest,
        payload: &Payload,
        total: u64,
        progress: &ProgressReporter,
    ) -> Result<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&request.bucket)
            .key(&request.key)
            .content_type(request.kind.mime_type())
            .checksum_algorithm(ChecksumAlgorithm::Crc32)
            .send()
            .await
            .map_err(|e| Error::S3(format!("Failed to start multipart upload: {}", e)))?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| Error::S3("Multipart upload started without an upload id".to_string()))?
            .to_string();

        let outcome = match self
            .upload_parts(request, payload, &upload_id, total, progress)
            .await
        {
            Ok(parts) => self.complete(request, &upload_id, parts).await,
            Err(e) => Err(e),
        };

        if outcome.is_err() {
            if let Err(e) = self
                .client
                .abort_multipart_upload()
                .bucket(&request.bucket)
                .key(&request.key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                warn!("Failed to abort multipart upload {}: {}", upload_id, e);
            }
        }

        outcome
    }

    async fn upload_parts(
        &self,
        request: &UploadRequest,
        payload: &Payload,
        upload_id: &str,
        total: u64,
        progress: &ProgressReporter,
    ) -> Result<Vec<CompletedPart>> {
        let mut reader = PartReader::open(payload).await?;
        let mut parts = Vec::new();
        let mut sent = 0u64;
        let mut part_number = 1i32;

        while let Some(part) = reader.next_part(self.part_size).await? {
            let len = part.len() as u64;
            let uploaded = self
                .client
                .upload_part()
                .bucket(&request.bucket)
                .key(&request.key)
                .upload_id(upload_id)
                .part_number(part_number)
                .checksum_algorithm(ChecksumAlgorithm::Crc32)
                .body(ByteStream::from(part))
                .send()
                .await
                .map_err(|e| {
                    Error::S3(format!("Failed to upload part {}: {}", part_number, e))
                })?;

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .set_checksum_crc32(uploaded.checksum_crc32().map(str::to_string))
                    .build(),
            );

            sent += len;
            debug!("Uploaded part {} of {} ({}/{} bytes)", part_number, request.key, sent, total);
            progress.report_bytes(sent, total);
            part_number += 1;
        }

        Ok(parts)
    }

    async fn complete(
        &self,
        request: &UploadRequest,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        self.client
            .complete_multipart_upload()
            .bucket(&request.bucket)
            .key(&request.key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| Error::S3(format!("Failed to complete multipart upload: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl UploadStrategy for TransferManager {
    async fn upload(
        &self,
        mut request: UploadRequest,
        progress: &ProgressReporter,
    ) -> Result<UploadResult> {
        // The payload takes the source's bytes; the request keeps only its target.
        let source = std::mem::replace(&mut request.source, UploadSource::Bytes(Vec::new()));

        // Held until the transfer finishes; dropping it removes the file.
        let mut staged = None;
        let payload = match source {
            UploadSource::Bytes(data) if request.kind == ContentKind::Image => {
                let file = Self::stage(&data, &request.key).await?;
                let path = file.path().to_path_buf();
                staged = Some(file);
                Payload::File(path)
            }
            UploadSource::Bytes(data) => Payload::Buffer(Bytes::from(data)),
            UploadSource::File(path) => Payload::File(path),
        };

        let total = Self::payload_len(&payload).await?;
        info!(
            "Uploading {} ({} bytes) to bucket {}",
            request.key, total, request.bucket
        );

        let outcome = if total < self.part_size as u64 {
            self.put_single(&request, payload).await.map(|()| {
                progress.report(1.0);
            })
        } else {
            self.put_multipart(&request, &payload, total, progress)
                .await
        };
        drop(staged);

        if let Err(e) = outcome {
            error!("Upload of {} failed: {}", request.key, e);
            return Err(e);
        }

        let url = object_url(&self.endpoint, &request.bucket, &request.key);
        info!("Uploaded to: {}", url);
        Ok(UploadResult {
            url,
            key: request.key,
            kind: request.kind,
        })
    }

    fn name(&self) -> &'static str {
        "managed"
    }
}
