use std::time::Duration;

use async_trait::async_trait;
use ::s3::creds::Credentials;
use ::s3::error::S3Error;
use ::s3::{Bucket, Region};
use tracing::debug;

use super::error::StorageError;
use super::settings::S3Settings;
use super::traits::ObjectStore;

/// Object store backed by an S3-compatible bucket.
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
    max_size: u64,
}

impl S3ObjectStore {
    pub fn new(settings: &S3Settings, max_size: u64) -> Result<Self, StorageError> {
        let region = match &settings.endpoint {
            Some(endpoint) => Region::Custom {
                region: settings.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => settings
                .region
                .parse::<Region>()
                .map_err(|e| StorageError::Backend(format!("invalid region: {e}")))?,
        };

        let credentials = Credentials::new(
            settings.access_key.as_deref(),
            settings.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid credentials: {e}")))?;

        let mut bucket = Bucket::new(&settings.bucket, region, credentials).map_err(backend)?;
        if settings.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket, max_size })
    }
}

fn backend(err: S3Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn is_success(code: u16) -> bool {
    (200..300).contains(&code)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let response = self.bucket.put_object(key, data).await.map_err(backend)?;
        if !is_success(response.status_code()) {
            return Err(StorageError::Backend(format!(
                "PUT {key} returned status {}",
                response.status_code()
            )));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = match self.bucket.get_object(key).await {
            Ok(response) => response,
            Err(S3Error::HttpFailWithBody(404, _)) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(backend(e)),
        };

        match response.status_code() {
            404 => Err(StorageError::NotFound(key.to_string())),
            code if is_success(code) => Ok(response.bytes().to_vec()),
            code => Err(StorageError::Backend(format!(
                "GET {key} returned status {code}"
            ))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.bucket.head_object(key).await {
            Ok((_, code)) if is_success(code) => Ok(true),
            Ok((_, 404)) | Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Ok((_, code)) => Err(StorageError::Backend(format!(
                "HEAD {key} returned status {code}"
            ))),
            Err(e) => Err(backend(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        // S3 DELETE succeeds for absent keys, so probe first to report whether
        // anything was actually removed.
        if !self.exists(key).await? {
            return Ok(false);
        }

        let response = match self.bucket.delete_object(key).await {
            Ok(response) => response,
            Err(S3Error::HttpFailWithBody(404, _)) => return Ok(false),
            Err(e) => return Err(backend(e)),
        };

        match response.status_code() {
            404 => Ok(false),
            code if is_success(code) => {
                debug!(key, "Deleted S3 object");
                Ok(true)
            }
            code => Err(StorageError::Backend(format!(
                "DELETE {key} returned status {code}"
            ))),
        }
    }

    async fn presign(&self, key: &str, expires_in: Duration) -> Result<String, StorageError> {
        let secs = u32::try_from(expires_in.as_secs()).unwrap_or(u32::MAX);
        self.bucket
            .presign_get(key, secs, None)
            .await
            .map_err(backend)
    }
}
