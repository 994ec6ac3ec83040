// Object Store Client Port
// Abstraction over the key/value blob store (S3 in production)

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Object store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("store request failed: {0}")]
    Request(String),
}

/// Object store capability set
///
/// Implementations:
/// - S3ObjectStore (infra-s3): AWS S3 or any S3-compatible endpoint
/// - mocks::MemoryObjectStore: in-memory store for tests
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Object size in bytes
    ///
    /// # Errors
    /// - StoreError::NotFound if the key does not exist
    async fn head(&self, bucket: &str, key: &str) -> Result<u64, StoreError>;

    /// Fetch the full object body
    ///
    /// # Errors
    /// - StoreError::NotFound if the key does not exist
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Write an object with user metadata
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Signed, time-limited retrieval URL usable without further auth
    async fn presign_get(&self, bucket: &str, key: &str, ttl_secs: u64)
        -> Result<String, StoreError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    type StoredObject = (Vec<u8>, HashMap<String, String>);

    /// In-memory ObjectStore for tests
    pub struct MemoryObjectStore {
        objects: Mutex<HashMap<(String, String), StoredObject>>,
        fail_next: Mutex<Option<String>>,
    }

    impl MemoryObjectStore {
        pub fn new() -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
                fail_next: Mutex::new(None),
            }
        }

        /// Seed an object (test setup)
        pub fn insert(&self, bucket: &str, key: &str, bytes: Vec<u8>) {
            self.objects.lock().unwrap().insert(
                (bucket.to_string(), key.to_string()),
                (bytes, HashMap::new()),
            );
        }

        /// Stored bytes, if present
        pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .map(|(bytes, _)| bytes.clone())
        }

        /// Stored user metadata, if present
        pub fn metadata(&self, bucket: &str, key: &str) -> Option<HashMap<String, String>> {
            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .map(|(_, meta)| meta.clone())
        }

        pub fn contains(&self, bucket: &str, key: &str) -> bool {
            self.objects
                .lock()
                .unwrap()
                .contains_key(&(bucket.to_string(), key.to_string()))
        }

        /// Make the next store operation fail with a Request error
        pub fn fail_next_request(&self, message: impl Into<String>) {
            *self.fail_next.lock().unwrap() = Some(message.into());
        }

        fn take_injected_failure(&self) -> Option<StoreError> {
            self.fail_next
                .lock()
                .unwrap()
                .take()
                .map(StoreError::Request)
        }
    }

    impl Default for MemoryObjectStore {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryObjectStore {
        async fn head(&self, bucket: &str, key: &str) -> Result<u64, StoreError> {
            if let Some(err) = self.take_injected_failure() {
                return Err(err);
            }
            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .map(|(bytes, _)| bytes.len() as u64)
                .ok_or_else(|| StoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
        }

        async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
            if let Some(err) = self.take_injected_failure() {
                return Err(err);
            }
            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .map(|(bytes, _)| bytes.clone())
                .ok_or_else(|| StoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
        }

        async fn put(
            &self,
            bucket: &str,
            key: &str,
            bytes: Vec<u8>,
            metadata: HashMap<String, String>,
        ) -> Result<(), StoreError> {
            if let Some(err) = self.take_injected_failure() {
                return Err(err);
            }
            self.objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), (bytes, metadata));
            Ok(())
        }

        async fn presign_get(
            &self,
            bucket: &str,
            key: &str,
            ttl_secs: u64,
        ) -> Result<String, StoreError> {
            if let Some(err) = self.take_injected_failure() {
                return Err(err);
            }
            if !self.contains(bucket, key) {
                return Err(StoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            Ok(format!(
                "https://{}.store.test/{}?expires={}&signature=mock",
                bucket, key, ttl_secs
            ))
        }
    }
}
