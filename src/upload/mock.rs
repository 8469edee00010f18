use super::{object_url, ProgressReporter, UploadStrategy};
use crate::models::{UploadRequest, UploadResult, UploadSource};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory strategy that records uploaded objects per `bucket/key`.
#[derive(Clone)]
pub struct MockUploadStrategy {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    content_types: Arc<Mutex<HashMap<String, String>>>,
    endpoint: String,
    progress_steps: usize,
    should_fail: Arc<Mutex<bool>>,
    upload_count: Arc<Mutex<usize>>,
}

impl MockUploadStrategy {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            content_types: Arc::new(Mutex::new(HashMap::new())),
            endpoint: "https://mock-s3.example.com".to_string(),
            progress_steps: 4,
            should_fail: Arc::new(Mutex::new(false)),
            upload_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_progress_steps(mut self, steps: usize) -> Self {
        self.progress_steps = steps;
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap()
    }

    pub fn get_object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{}/{}", bucket, key))
            .cloned()
    }

    pub fn get_content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.content_types
            .lock()
            .unwrap()
            .get(&format!("{}/{}", bucket, key))
            .cloned()
    }
}

impl Default for MockUploadStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UploadStrategy for MockUploadStrategy {
    async fn upload(
        &self,
        request: UploadRequest,
        progress: &ProgressReporter,
    ) -> Result<UploadResult> {
        *self.upload_count.lock().unwrap() += 1;

        if *self.should_fail.lock().unwrap() {
            return Err(Error::S3("Mock failure".to_string()));
        }

        let data = match request.source {
            UploadSource::Bytes(data) => data,
            UploadSource::File(path) => tokio::fs::read(&path).await?,
        };

        for step in 1..=self.progress_steps {
            progress.report(step as f64 / self.progress_steps as f64);
        }

        let object = format!("{}/{}", request.bucket, request.key);
        self.content_types
            .lock()
            .unwrap()
            .insert(object.clone(), request.kind.mime_type().to_string());
        self.objects.lock().unwrap().insert(object, data);

        Ok(UploadResult {
            url: object_url(&self.endpoint, &request.bucket, &request.key),
            key: request.key,
            kind: request.kind,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
