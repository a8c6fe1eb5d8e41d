//! Delivery of generated plans to the configured sink.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use nightshift_core::{CanonicalIntake, DeliveryKey, DeliveryRecord};
use nightshift_mail::{MailClient, OutboundMail};
use nightshift_store::{KeyedStore, StoreError};
use serde::Serialize;
use tracing::{error, info};

use crate::DeliveryError;
use crate::render::{PLAN_TITLE, render_plan_html};

/// Which sink a deployment delivers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Inline,
    Store,
    Email,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Store => "store",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "store" => Ok(Self::Store),
            "email" => Ok(Self::Email),
            other => Err(format!("unknown sink '{other}' (expected inline, store or email)")),
        }
    }
}

/// A configured sink.
#[derive(Clone)]
pub enum Sink {
    /// Hand the plan back to the caller.
    Inline,
    Store(Arc<dyn KeyedStore>),
    Email(MailClient),
}

impl Sink {
    pub fn kind(&self) -> SinkKind {
        match self {
            Self::Inline => SinkKind::Inline,
            Self::Store(_) => SinkKind::Store,
            Self::Email(_) => SinkKind::Email,
        }
    }
}

/// What a successful delivery produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Inline {
        record: DeliveryRecord,
        html: String,
    },
    Stored {
        record: DeliveryRecord,
    },
    Emailed {
        record: DeliveryRecord,
        message_id: Option<String>,
    },
}

impl DeliveryOutcome {
    pub fn record(&self) -> &DeliveryRecord {
        match self {
            Self::Inline { record, .. } | Self::Stored { record } | Self::Emailed { record, .. } => {
                record
            }
        }
    }

    pub fn sink(&self) -> SinkKind {
        match self {
            Self::Inline { .. } => SinkKind::Inline,
            Self::Stored { .. } => SinkKind::Store,
            Self::Emailed { .. } => SinkKind::Email,
        }
    }
}

/// Per-key async locks.
///
/// Entries nobody holds are dropped on the next acquire.
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<DeliveryKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    async fn acquire(&self, key: &DeliveryKey) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|k, l| k == key || Arc::strong_count(l) > 1);
            locks.entry(key.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Delivers each generated plan exactly once through one sink.
pub struct DeliveryOrchestrator {
    sink: Sink,
    locks: KeyLocks,
}

impl DeliveryOrchestrator {
    pub fn new(sink: Sink) -> Self {
        Self {
            sink,
            locks: KeyLocks::default(),
        }
    }

    pub fn sink_kind(&self) -> SinkKind {
        self.sink.kind()
    }

    /// Deliver `text` for `intake`.
    ///
    /// On failure the plan is logged before the error is returned, so it is
    /// never lost silently.
    pub async fn deliver(
        &self,
        intake: &CanonicalIntake,
        text: String,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let key = DeliveryKey::for_intake(intake);
        let record = DeliveryRecord::new(key, text, intake.submission_id.clone());

        let result = self.send(intake, record.clone()).await;
        match &result {
            Ok(outcome) => info!(
                key = %record.key,
                submission_id = %record.submission_id,
                sink = %outcome.sink(),
                "plan delivered"
            ),
            Err(e) => error!(
                key = %record.key,
                submission_id = %record.submission_id,
                sink = %self.sink.kind(),
                error = %e,
                plan = %record.content,
                "delivery failed; undelivered plan follows"
            ),
        }
        result
    }

    async fn send(
        &self,
        intake: &CanonicalIntake,
        record: DeliveryRecord,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        match &self.sink {
            Sink::Inline => {
                let html = render_plan_html(&record.content, intake.contact_address.as_deref());
                Ok(DeliveryOutcome::Inline { record, html })
            }
            Sink::Store(store) => {
                if store.atomic_overwrite() {
                    store.put(&record).await?;
                } else {
                    let _guard = self.locks.acquire(&record.key).await;
                    store.put(&record).await?;
                }
                Ok(DeliveryOutcome::Stored { record })
            }
            Sink::Email(client) => {
                let to = intake
                    .contact_address
                    .clone()
                    .ok_or(DeliveryError::NoRecipient)?;
                let mail = OutboundMail {
                    html: Some(render_plan_html(&record.content, Some(&to))),
                    to,
                    subject: PLAN_TITLE.to_string(),
                    text: record.content.clone(),
                };
                let message_id = client.send(&mail).await?;
                Ok(DeliveryOutcome::Emailed { record, message_id })
            }
        }
    }

    /// Latest stored record for `key`. `None` unless the sink is a store.
    pub async fn stored(&self, key: &DeliveryKey) -> Result<Option<DeliveryRecord>, StoreError> {
        match &self.sink {
            Sink::Store(store) => store.get(key).await,
            Sink::Inline | Sink::Email(_) => Ok(None),
        }
    }
}
