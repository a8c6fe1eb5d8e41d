//! Inbound webhook payload model.
//!
//! Form providers deliver an envelope with a `data.fields` array. Each entry
//! carries a provider-assigned `key`, a human `label`, a `type` and a `value`
//! whose shape depends on the type: plain text for inputs, a list of option
//! ids for choice questions. Field keys change whenever the form is edited,
//! so nothing downstream relies on them directly.

use ring::digest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::IntakeError;

/// Answer shape declared by the form provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Scalar,
    SingleSelect,
    MultiSelect,
}

impl FieldKind {
    /// Map a provider `type` string onto a kind. Unknown and missing types
    /// are treated as scalar answers.
    pub fn from_wire(type_name: Option<&str>) -> Self {
        let upper = type_name.map(|t| t.trim().to_ascii_uppercase());
        match upper.as_deref() {
            Some("MULTIPLE_CHOICE" | "DROPDOWN" | "RANKING") => Self::SingleSelect,
            Some("CHECKBOXES" | "MULTI_SELECT") => Self::MultiSelect,
            _ => Self::Scalar,
        }
    }

    pub fn is_select(self) -> bool {
        matches!(self, Self::SingleSelect | Self::MultiSelect)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::SingleSelect => "single_select",
            Self::MultiSelect => "multi_select",
        }
    }
}

/// Raw answer as delivered, before option lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Ids(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub id: String,
    pub text: String,
}

/// One answered (or unanswered) question from the submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawField {
    pub identifier: String,
    pub label: String,
    pub kind: FieldKind,
    /// `None` when the respondent skipped the question.
    pub value: Option<RawValue>,
    /// Declared options, in form order. Empty for scalar fields.
    pub options: Vec<SelectOption>,
}

impl RawField {
    pub fn scalar(identifier: &str, label: &str, value: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            label: label.to_string(),
            kind: FieldKind::Scalar,
            value: Some(RawValue::Text(value.to_string())),
            options: Vec::new(),
        }
    }

    pub fn single_select(
        identifier: &str,
        label: &str,
        selected: &str,
        options: &[(&str, &str)],
    ) -> Self {
        Self {
            identifier: identifier.to_string(),
            label: label.to_string(),
            kind: FieldKind::SingleSelect,
            value: Some(RawValue::Ids(vec![selected.to_string()])),
            options: to_options(options),
        }
    }

    pub fn multi_select(
        identifier: &str,
        label: &str,
        selected: &[&str],
        options: &[(&str, &str)],
    ) -> Self {
        Self {
            identifier: identifier.to_string(),
            label: label.to_string(),
            kind: FieldKind::MultiSelect,
            value: Some(RawValue::Ids(
                selected.iter().map(|s| s.to_string()).collect(),
            )),
            options: to_options(options),
        }
    }

    /// Look up the display text of a declared option.
    pub fn option_text(&self, id: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.id == id)
            .map(|o| o.text.as_str())
    }

    fn from_wire(wire: WireField) -> Self {
        let kind = FieldKind::from_wire(wire.kind.as_deref());
        let value = match wire.value {
            Value::Null => None,
            Value::String(s) if kind.is_select() => Some(RawValue::Ids(vec![s])),
            Value::String(s) => Some(RawValue::Text(s)),
            Value::Array(items) => Some(RawValue::Ids(
                items.iter().filter_map(json_text).collect(),
            )),
            other => Some(RawValue::Text(other.to_string())),
        };
        let options = if kind.is_select() {
            wire.options
                .unwrap_or_default()
                .into_iter()
                .filter_map(|o| {
                    Some(SelectOption {
                        id: json_text(&o.id)?,
                        text: o.text.unwrap_or_default(),
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            identifier: wire.key.unwrap_or_default().trim().to_string(),
            label: wire.label.unwrap_or_default(),
            kind,
            value,
            options,
        }
    }
}

fn to_options(options: &[(&str, &str)]) -> Vec<SelectOption> {
    options
        .iter()
        .map(|(id, text)| SelectOption {
            id: id.to_string(),
            text: text.to_string(),
        })
        .collect()
}

/// A parsed webhook submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    submission_id: String,
    fields: Vec<RawField>,
}

impl RawPayload {
    pub fn new(submission_id: impl Into<String>, fields: Vec<RawField>) -> Self {
        Self {
            submission_id: submission_id.into(),
            fields,
        }
    }

    /// Parse a webhook body.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IntakeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Parse an already-decoded webhook body.
    ///
    /// Missing `data` or `data.fields` is a [`IntakeError::MalformedPayload`].
    /// The submission id comes from `data.submissionId`, `data.responseId` or
    /// the top-level `eventId`, in that order; when none is present it is a
    /// digest of the fields so that repeated parses agree.
    pub fn from_value(value: Value) -> Result<Self, IntakeError> {
        if !value.is_object() {
            return Err(IntakeError::MalformedPayload(
                "payload is not a JSON object".into(),
            ));
        }
        let envelope: WireEnvelope = serde_json::from_value(value)?;
        let data = envelope
            .data
            .ok_or_else(|| IntakeError::MalformedPayload("missing `data` object".into()))?;
        let wire_fields = data
            .fields
            .ok_or_else(|| IntakeError::MalformedPayload("missing `data.fields` array".into()))?;

        let fields: Vec<RawField> = wire_fields.into_iter().map(RawField::from_wire).collect();
        let submission_id = [data.submission_id, data.response_id, envelope.event_id]
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| content_digest(&fields));

        Ok(Self {
            submission_id,
            fields,
        })
    }

    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    pub fn fields(&self) -> &[RawField] {
        &self.fields
    }
}

fn content_digest(fields: &[RawField]) -> String {
    let bytes = serde_json::to_vec(fields).unwrap_or_default();
    let hash = digest::digest(&digest::SHA256, &bytes);
    format!("sha256:{}", hex::encode(&hash.as_ref()[..8]))
}

/// Render a JSON scalar as text. Objects and arrays keep their JSON form.
fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ── Wire format ──

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    event_id: Option<String>,
    data: Option<WireData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireData {
    submission_id: Option<String>,
    response_id: Option<String>,
    fields: Option<Vec<WireField>>,
}

#[derive(Deserialize)]
struct WireField {
    key: Option<String>,
    label: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    value: Value,
    options: Option<Vec<WireOption>>,
}

#[derive(Deserialize)]
struct WireOption {
    #[serde(default)]
    id: Value,
    text: Option<String>,
}
