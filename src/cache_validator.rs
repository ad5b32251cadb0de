use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::AppError;

/// Integrity envelope for blobs written to the persistent store.
///
/// A blob whose checksum no longer matches (partial write, manual edit)
/// is reported as absent so the caller falls back to the backend.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidatedCacheEntry {
    /// The payload (JSON string)
    pub data: String,
    /// SHA-256 checksum of the data (hex encoded)
    pub checksum: String,
}

impl ValidatedCacheEntry {
    pub fn new(data: String) -> Self {
        let checksum = Self::compute_checksum(&data);
        Self { data, checksum }
    }

    fn compute_checksum(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.data) == self.checksum
    }

    pub fn serialize(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns the payload if the envelope parses and validates.
    pub fn deserialize_and_validate(serialized: &str) -> Option<String> {
        let entry: ValidatedCacheEntry = match serde_json::from_str(serialized) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Discarding unreadable cache entry: {}", e);
                return None;
            }
        };

        if entry.is_valid() {
            Some(entry.data)
        } else {
            tracing::warn!(
                "Cache validation failed: checksum mismatch. Expected: {}, Data length: {}",
                entry.checksum,
                entry.data.len()
            );
            None
        }
    }
}

/// Serializes a value and wraps it in a checksummed envelope.
pub fn seal<T: Serialize>(value: &T) -> Result<String, AppError> {
    ValidatedCacheEntry::new(serde_json::to_string(value)?).serialize()
}

/// Inverse of [`seal`]. Anything invalid yields `None`.
pub fn open<T: DeserializeOwned>(serialized: &str) -> Option<T> {
    let data = ValidatedCacheEntry::deserialize_and_validate(serialized)?;
    match serde_json::from_str(&data) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Cache entry does not match the expected shape: {}", e);
            None
        }
    }
}
