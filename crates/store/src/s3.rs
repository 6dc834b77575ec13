//! S3-backed object store over rust-s3's blocking client.

use chrono::{DateTime, Utc};
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;

use crate::{ObjectMeta, ObjectStore, StoreError};

/// Connection settings for one bucket.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores; when absent the regional
    /// AWS endpoint is used.
    pub endpoint: Option<String>,
}

pub struct S3Store {
    bucket: Bucket,
}

impl S3Store {
    /// Open a bucket using credentials from the environment
    /// (AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY and friends).
    pub fn open(config: &S3Config) -> Result<Self, StoreError> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", config.region)),
        };
        let credentials = Credentials::default()
            .map_err(|e| StoreError::Credentials(e.to_string()))?;
        let bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(S3Store { bucket })
    }

    fn check_status(status: u16, key: &str) -> Result<(), StoreError> {
        match status {
            200..=299 => Ok(()),
            404 => Err(StoreError::NotFound(key.to_string())),
            other => Err(StoreError::Backend(format!(
                "unexpected status {} for {}",
                other, key
            ))),
        }
    }
}

impl ObjectStore for S3Store {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let pages = self
            .bucket
            .list(prefix.to_string(), None)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut objects = Vec::new();
        for page in pages {
            for item in page.contents {
                let last_modified = DateTime::parse_from_rfc3339(&item.last_modified)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                objects.push(ObjectMeta {
                    key: item.key,
                    last_modified,
                    size: item.size,
                });
            }
        }
        Ok(objects)
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        // Any HEAD failure is treated as "absent"; a broken connection will
        // surface on the subsequent list/get instead.
        match self.bucket.head_object(key) {
            Ok((_, status)) => Ok((200..=299).contains(&status)),
            Err(_) => Ok(false),
        }
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let response = self
            .bucket
            .get_object(key)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Self::check_status(response.status_code(), key)?;
        Ok(response.bytes().to_vec())
    }

    fn put(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        let response = self
            .bucket
            .put_object(key, body)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Self::check_status(response.status_code(), key)
    }

    fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        let status = self
            .bucket
            .copy_object_internal(src, dst)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Self::check_status(status, dst)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let response = self
            .bucket
            .delete_object(key)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        match response.status_code() {
            200..=299 => Ok(()),
            404 => Err(StoreError::NotFound(key.to_string())),
            other => Err(StoreError::Backend(format!(
                "unexpected status {} deleting {}",
                other, key
            ))),
        }
    }
}
