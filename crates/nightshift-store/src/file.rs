//! File-backed keyed store: one JSON document per delivery key.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nightshift_core::{DeliveryKey, DeliveryRecord};
use ring::digest;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{KeyedStore, StoreError};

/// Longest stem written as-is. Longer ones are cut and given a digest
/// suffix, keeping `<stem>.json` well under the 255-byte name limit.
const MAX_STEM_LEN: usize = 200;
const HASHED_PREFIX_LEN: usize = 160;

/// Separator before the digest suffix. `~` never appears in an encoded key.
const DIGEST_MARK: char = '~';

/// File stem for `key`: the reversible encoding, or for long keys a prefix
/// of it followed by `~` and 32 hex chars of its SHA-256.
fn stem_for(key: &DeliveryKey) -> String {
    let stem = key.file_stem();
    if stem.len() <= MAX_STEM_LEN {
        return stem;
    }
    let hash = digest::digest(&digest::SHA256, key.as_str().as_bytes());
    // Encoded stems are ASCII, so any byte index is a char boundary.
    format!(
        "{}{DIGEST_MARK}{}",
        &stem[..HASHED_PREFIX_LEN],
        hex::encode(&hash.as_ref()[..16])
    )
}

/// Directory of `<stem>.json` files, one per delivery key.
///
/// Writes go to a temporary file in the same directory and are renamed over
/// the target, so a reader sees either the previous record or the new one,
/// never a partial write. Concurrent writers to one key need no lock: the
/// last rename wins.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(dir).await?;
        let meta = tokio::fs::metadata(dir).await?;
        if !meta.is_dir() {
            return Err(StoreError::Directory(dir.to_path_buf()));
        }
        info!(dir = %dir.display(), "opened plan store");
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `key`.
    pub fn path_for(&self, key: &DeliveryKey) -> PathBuf {
        self.dir.join(format!("{}.json", stem_for(key)))
    }

    /// Keys currently stored, sorted.
    pub async fn keys(&self) -> Result<Vec<DeliveryKey>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if stem.contains(DIGEST_MARK) {
                // Digest names are one-way; the record carries the key.
                let bytes = tokio::fs::read(entry.path()).await?;
                let record: DeliveryRecord = serde_json::from_slice(&bytes)?;
                keys.push(record.key);
            } else if let Some(key) = DeliveryKey::from_file_stem(stem) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl KeyedStore for FileStore {
    async fn put(&self, record: &DeliveryRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        let dir = self.dir.clone();
        let target = self.path_for(&record.key);

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&target)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Other(format!("store write task failed: {e}")))??;

        debug!(key = %record.key, submission_id = %record.submission_id, "stored plan");
        Ok(())
    }

    async fn get(&self, key: &DeliveryKey) -> Result<Option<DeliveryRecord>, StoreError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => {
                let record: DeliveryRecord = serde_json::from_slice(&bytes)?;
                Ok((record.key == *key).then_some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
