//! Storage layer: the keyed plan store behind the `store` delivery sink.

mod error;
pub use error::StoreError;

mod file;
pub use file::FileStore;

mod memory;
pub use memory::MemoryStore;

use async_trait::async_trait;
use nightshift_core::{DeliveryKey, DeliveryRecord};

/// Last-write-wins storage of delivery records by key.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Replace whatever is stored under `record.key`.
    async fn put(&self, record: &DeliveryRecord) -> Result<(), StoreError>;

    async fn get(&self, key: &DeliveryKey) -> Result<Option<DeliveryRecord>, StoreError>;

    /// Whether a `put` replaces the previous record in one indivisible step.
    ///
    /// Callers must serialize writes per key when this is `false`.
    fn atomic_overwrite(&self) -> bool {
        true
    }
}
