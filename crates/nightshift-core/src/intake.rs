//! The canonical intake record and the non-fatal findings gathered while
//! building it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CoercionError, SemanticRole};

/// Normalized answers from one submission.
///
/// Absent answers stay `None`; placeholder wording belongs to the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalIntake {
    pub shift_start: Option<String>,
    pub shift_end: Option<String>,
    /// Option text in selection order, without duplicates.
    pub workdays: Vec<String>,
    pub sleep_challenge: Option<String>,
    /// Always a plausible address when present, never empty.
    pub contact_address: Option<String>,
    pub submission_id: String,
}

impl CanonicalIntake {
    pub fn empty(submission_id: impl Into<String>) -> Self {
        Self {
            shift_start: None,
            shift_end: None,
            workdays: Vec::new(),
            sleep_challenge: None,
            contact_address: None,
            submission_id: submission_id.into(),
        }
    }

    /// Text value for a role, joining workdays with `", "`.
    pub fn value(&self, role: SemanticRole) -> Option<String> {
        match role {
            SemanticRole::ShiftStart => self.shift_start.clone(),
            SemanticRole::ShiftEnd => self.shift_end.clone(),
            SemanticRole::Workdays => {
                (!self.workdays.is_empty()).then(|| self.workdays.join(", "))
            }
            SemanticRole::SleepChallenge => self.sleep_challenge.clone(),
            SemanticRole::ContactAddress => self.contact_address.clone(),
        }
    }
}

/// Check that `s` looks like a deliverable address: one `@`, a non-empty
/// local part, a dotted domain without empty labels, and no whitespace.
pub fn is_plausible_address(s: &str) -> bool {
    if s.is_empty() || s.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = s.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}

/// Non-fatal finding from one normalization pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizationWarning {
    /// No rule for the role found a field.
    Unmatched { role: SemanticRole },
    /// A field was found but carried no usable answer.
    EmptyAnswer { role: SemanticRole, field: String },
    Coercion {
        role: SemanticRole,
        error: CoercionError,
    },
    InvalidContactAddress { field: String, value: String },
}

impl NormalizationWarning {
    pub fn role(&self) -> SemanticRole {
        match self {
            Self::Unmatched { role } | Self::EmptyAnswer { role, .. } | Self::Coercion { role, .. } => {
                *role
            }
            Self::InvalidContactAddress { .. } => SemanticRole::ContactAddress,
        }
    }
}

impl fmt::Display for NormalizationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmatched { role } => write!(f, "{role}: no matching field"),
            Self::EmptyAnswer { role, field } => write!(f, "{role}: field {field} has no answer"),
            Self::Coercion { role, error } => write!(f, "{role}: {error}"),
            Self::InvalidContactAddress { field, value } => {
                write!(f, "ContactAddress: field {field} value {value:?} is not an address")
            }
        }
    }
}
