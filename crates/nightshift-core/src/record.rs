//! Stored delivery record, shared between the keyed store and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DeliveryKey;

/// The latest generated plan for a delivery key.
///
/// A later delivery for the same key replaces the record wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub key: DeliveryKey,
    pub content: String,
    pub submission_id: String,
    pub created_at: DateTime<Utc>,
}

impl DeliveryRecord {
    pub fn new(key: DeliveryKey, content: String, submission_id: String) -> Self {
        Self {
            key,
            content,
            submission_id,
            created_at: Utc::now(),
        }
    }
}
