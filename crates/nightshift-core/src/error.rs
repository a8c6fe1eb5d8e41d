use serde::Serialize;
use thiserror::Error;

use crate::SemanticRole;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(SemanticRole),
}

impl From<serde_json::Error> for IntakeError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedPayload(e.to_string())
    }
}

/// Field-level failure while turning a raw answer into text.
///
/// Never fatal on its own; the normalizer records it as a warning.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoercionError {
    #[error("field {field}: selected option {id} is not among its declared options")]
    DanglingReference { field: String, id: String },

    #[error("field {field}: unknown option {id} dropped from selection")]
    UnknownOptionId { field: String, id: String },
}
