//! In-process keyed store, for tests and single-instance deployments that do
//! not need plans to survive a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use nightshift_core::{DeliveryKey, DeliveryRecord};
use tokio::sync::RwLock;

use crate::{KeyedStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<DeliveryKey, DeliveryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl KeyedStore for MemoryStore {
    async fn put(&self, record: &DeliveryRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, key: &DeliveryKey) -> Result<Option<DeliveryRecord>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }
}
