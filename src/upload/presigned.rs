use super::{object_url, ProgressReporter, UploadStrategy};
use crate::models::{Config, UploadRequest, UploadResult, UploadSource};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_sdk_s3::presigning::{PresignedRequest, PresigningConfig};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE,
};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, error, info};

/// Request bodies are streamed in chunks of this size so progress can be observed.
const BODY_CHUNK_SIZE: usize = 64 * 1024;

/// Uploads by signing a short-lived PUT URL and sending the bytes with a plain HTTP client.
pub struct PresignedUploader {
    client: S3Client,
    http: reqwest::Client,
    endpoint: String,
    expires_in: Duration,
}

impl PresignedUploader {
    pub fn new(client: S3Client, config: &Config) -> Self {
        Self::new_with_http(client, config, reqwest::Client::new())
    }

    pub fn new_with_http(client: S3Client, config: &Config, http: reqwest::Client) -> Self {
        Self {
            client,
            http,
            endpoint: config.storage_endpoint(),
            expires_in: Duration::from_secs(config.presign_expiry_secs),
        }
    }

    /// Sign a PUT for `key` in `bucket` with an explicit content type.
    pub async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<PresignedRequest> {
        let presigning = PresigningConfig::expires_in(self.expires_in)
            .map_err(|e| Error::Signing(format!("Invalid expiry: {}", e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| {
                error!("Failed to sign upload URL for {}/{}: {}", bucket, key, e);
                Error::Signing(e.to_string())
            })
    }

    fn build_headers(
        presigned: &PresignedRequest,
        content_type: &str,
        content_length: usize,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in presigned.headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Signing(format!("Invalid signed header name: {}", e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Signing(format!("Invalid signed header value: {}", e)))?;
            headers.insert(name, value);
        }

        let content_type = HeaderValue::from_str(content_type)
            .map_err(|e| Error::InvalidInput(format!("Invalid content type: {}", e)))?;
        headers.insert(CONTENT_TYPE, content_type);
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));
        Ok(headers)
    }
}

/// Body that reports the fraction of bytes handed to the transport.
fn progress_body(data: Vec<u8>, progress: ProgressReporter) -> reqwest::Body {
    let total = data.len() as u64;
    if total == 0 {
        return reqwest::Body::from(data);
    }

    let data = Bytes::from(data);
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(BODY_CHUNK_SIZE)
        .map(|start| data.slice(start..(start + BODY_CHUNK_SIZE).min(data.len())))
        .collect();

    let mut sent = 0u64;
    let stream = futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        progress.report_bytes(sent, total);
        Ok::<Bytes, std::io::Error>(chunk)
    });

    reqwest::Body::wrap_stream(stream)
}

#[async_trait]
impl UploadStrategy for PresignedUploader {
    async fn upload(
        &self,
        request: UploadRequest,
        progress: &ProgressReporter,
    ) -> Result<UploadResult> {
        let data = match request.source {
            UploadSource::Bytes(data) => data,
            UploadSource::File(path) => tokio::fs::read(&path).await?,
        };
        let content_type = request.kind.mime_type();

        let presigned = self
            .presign_put(&request.bucket, &request.key, content_type)
            .await?;
        debug!(
            "Signed PUT for {}/{} (expires in {:?})",
            request.bucket, request.key, self.expires_in
        );

        let headers = Self::build_headers(&presigned, content_type, data.len())?;
        let response = self
            .http
            .put(presigned.uri())
            .headers(headers)
            .body(progress_body(data, progress.clone()))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload {} to signed URL: {}", request.key, e);
                e
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "Signed upload of {} rejected (status {}): {}",
                request.key, status, error_text
            );
            return Err(Error::HttpStatus {
                status: status.as_u16(),
            });
        }

        info!("Uploaded {} via signed URL", request.key);
        Ok(UploadResult {
            url: object_url(&self.endpoint, &request.bucket, &request.key),
            key: request.key,
            kind: request.kind,
        })
    }

    fn name(&self) -> &'static str {
        "presigned"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentKind, StrategyKind};
    use crate::upload::progress::UploadEvent;
    use crate::upload::{build_s3_client, test_support};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn make_uploader(server: &MockServer) -> PresignedUploader {
        let config = test_support::config_for_endpoint(&server.uri(), StrategyKind::Presigned);
        let client = build_s3_client(&config).await.unwrap();
        PresignedUploader::new(client, &config)
    }

    fn image_request(data: Vec<u8>) -> UploadRequest {
        UploadRequest {
            source: UploadSource::Bytes(data),
            kind: ContentKind::Image,
            key: "A1B2.jpeg".to_string(),
            bucket: test_support::IMAGE_BUCKET.to_string(),
        }
    }

    #[tokio::test]
    async fn test_presign_put_targets_bucket_and_key() {
        let server = MockServer::start().await;
        let uploader = make_uploader(&server).await;

        let presigned = uploader
            .presign_put("app-videos", "clip.MOV", "video/quicktime")
            .await
            .unwrap();

        assert_eq!(presigned.method(), "PUT");
        assert!(presigned
            .uri()
            .starts_with(&format!("{}/app-videos/clip.MOV?", server.uri())));
        assert!(presigned.uri().contains("X-Amz-Expires=3600"));
        assert!(presigned.uri().contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn test_overlong_expiry_fails_signing_without_put() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config =
            test_support::config_for_endpoint(&server.uri(), StrategyKind::Presigned);
        config.presign_expiry_secs = crate::models::MAX_PRESIGN_EXPIRY_SECS + 1;
        let client = build_s3_client(&config).await.unwrap();
        let uploader = PresignedUploader::new(client, &config);

        let err = uploader
            .upload(image_request(vec![1, 2, 3]), &ProgressReporter::disabled())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Signing(_)));
    }

    #[tokio::test]
    async fn test_upload_puts_bytes_with_content_type() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/app-images/A1B2.jpeg"))
            .and(query_param("X-Amz-Algorithm", "AWS4-HMAC-SHA256"))
            .and(header("content-type", "image/jpeg"))
            .and(header("cache-control", "no-cache"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let uploader = make_uploader(&server).await;
        let result = uploader
            .upload(image_request(vec![0xFF, 0xD8, 0xFF, 0xE0]), &ProgressReporter::disabled())
            .await
            .unwrap();

        assert_eq!(result.key, "A1B2.jpeg");
        assert_eq!(result.kind, ContentKind::Image);
        assert_eq!(
            result.url,
            format!("{}/app-images/A1B2.jpeg", server.uri())
        );
    }

    #[tokio::test]
    async fn test_non_200_status_is_failure() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let uploader = make_uploader(&server).await;
        let err = uploader
            .upload(image_request(vec![1, 2, 3]), &ProgressReporter::disabled())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::HttpStatus { status: 204 }));
    }

    #[tokio::test]
    async fn test_forbidden_is_failure() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("SignatureDoesNotMatch"))
            .mount(&server)
            .await;

        let uploader = make_uploader(&server).await;
        let err = uploader
            .upload(image_request(vec![1, 2, 3]), &ProgressReporter::disabled())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::HttpStatus { status: 403 }));
    }

    #[tokio::test]
    async fn test_progress_reaches_one_for_chunked_body() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let uploader = make_uploader(&server).await;
        let (reporter, mut rx) = ProgressReporter::channel();
        let data = vec![7u8; BODY_CHUNK_SIZE * 3 + 10];

        uploader
            .upload(image_request(data), &reporter)
            .await
            .unwrap();
        drop(reporter);

        let mut fractions = Vec::new();
        while let Some(UploadEvent::Progress(p)) = rx.recv().await {
            fractions.push(p);
        }
        assert_eq!(fractions.len(), 4);
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(fractions.last().copied(), Some(1.0));
    }

    #[tokio::test]
    async fn test_received_body_matches_source() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let uploader = make_uploader(&server).await;
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        uploader
            .upload(image_request(data.clone()), &ProgressReporter::disabled())
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].body, data);
    }
}
