use nightshift_ai::GenerationError;
use nightshift_core::{IntakeError, SemanticRole};
use nightshift_mail::MailError;
use nightshift_store::StoreError;
use thiserror::Error;

use crate::Stage;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("store write failed: {0}")]
    Store(#[from] StoreError),
    #[error("mail send failed: {0}")]
    Mail(#[from] MailError),
    #[error("no recipient address for email delivery")]
    NoRecipient,
}

/// Terminal failure of one submission.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("missing required field: {0}")]
    MissingRequiredField(SemanticRole),
    #[error("plan generation failed: {0}")]
    DownstreamFailure(#[source] GenerationError),
    #[error("delivery failed: {0}")]
    DeliveryFailure(#[source] DeliveryError),
}

impl From<IntakeError> for PipelineError {
    fn from(e: IntakeError) -> Self {
        match e {
            IntakeError::MalformedPayload(msg) => Self::MalformedPayload(msg),
            IntakeError::MissingRequiredField(role) => Self::MissingRequiredField(role),
        }
    }
}

impl PipelineError {
    /// The stage that was not reached.
    pub fn failed_stage(&self) -> Stage {
        match self {
            Self::MalformedPayload(_) | Self::MissingRequiredField(_) => Stage::Normalized,
            Self::DownstreamFailure(_) => Stage::Generated,
            Self::DeliveryFailure(_) => Stage::Delivered,
        }
    }

    /// Caller errors: resubmitting the same payload cannot succeed.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedPayload(_) | Self::MissingRequiredField(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::DownstreamFailure(GenerationError::Timeout(_)))
    }
}
