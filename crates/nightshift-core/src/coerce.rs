//! Turn a matched raw field into human-readable text.

use crate::{CoercionError, FieldKind, RawField, RawValue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedValue {
    Text(String),
    List(Vec<String>),
}

/// Result of a successful coercion.
///
/// `value` is `None` when the question was left unanswered. `warnings` holds
/// the unknown option ids dropped from a multi-select.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Coerced {
    pub value: Option<NormalizedValue>,
    pub warnings: Vec<CoercionError>,
}

impl Coerced {
    fn answered(value: NormalizedValue) -> Self {
        Self {
            value: Some(value),
            warnings: Vec::new(),
        }
    }

    fn unanswered() -> Self {
        Self::default()
    }
}

/// Coerce a field according to its declared kind.
///
/// - Scalar: trimmed text. A list value is joined with `", "`.
/// - SingleSelect: the selected id resolved to its option text; an id missing
///   from `options` is a [`CoercionError::DanglingReference`].
/// - MultiSelect: each id resolved to option text in selection order. Unknown
///   ids are dropped and reported; repeated ids collapse to the first.
pub fn coerce(field: &RawField) -> Result<Coerced, CoercionError> {
    let Some(value) = &field.value else {
        return Ok(Coerced::unanswered());
    };

    match field.kind {
        FieldKind::Scalar => Ok(coerce_scalar(value)),
        FieldKind::SingleSelect => coerce_single(field, value),
        FieldKind::MultiSelect => Ok(coerce_multi(field, value)),
    }
}

fn coerce_scalar(value: &RawValue) -> Coerced {
    let text = match value {
        RawValue::Text(s) => s.trim().to_string(),
        RawValue::Ids(items) => items
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
    };
    if text.is_empty() {
        Coerced::unanswered()
    } else {
        Coerced::answered(NormalizedValue::Text(text))
    }
}

fn coerce_single(field: &RawField, value: &RawValue) -> Result<Coerced, CoercionError> {
    let selected = match value {
        RawValue::Text(s) => Some(s.as_str()),
        RawValue::Ids(ids) => ids.first().map(String::as_str),
    };
    let Some(id) = selected.filter(|id| !id.trim().is_empty()) else {
        return Ok(Coerced::unanswered());
    };

    let text = field
        .option_text(id)
        .ok_or_else(|| CoercionError::DanglingReference {
            field: field.identifier.clone(),
            id: id.to_string(),
        })?;

    let text = text.trim();
    if text.is_empty() {
        return Ok(Coerced::unanswered());
    }
    Ok(Coerced::answered(NormalizedValue::Text(text.to_string())))
}

fn coerce_multi(field: &RawField, value: &RawValue) -> Coerced {
    let ids: Vec<&str> = match value {
        RawValue::Text(s) => vec![s.as_str()],
        RawValue::Ids(ids) => ids.iter().map(String::as_str).collect(),
    };

    let mut texts: Vec<String> = Vec::with_capacity(ids.len());
    let mut warnings = Vec::new();
    let mut seen: Vec<&str> = Vec::with_capacity(ids.len());

    for id in ids {
        if seen.contains(&id) {
            continue;
        }
        seen.push(id);

        match field.option_text(id).map(str::trim) {
            Some(text) if !text.is_empty() => {
                if !texts.iter().any(|t| t == text) {
                    texts.push(text.to_string());
                }
            }
            Some(_) => {}
            None => warnings.push(CoercionError::UnknownOptionId {
                field: field.identifier.clone(),
                id: id.to_string(),
            }),
        }
    }

    Coerced {
        value: (!texts.is_empty()).then_some(NormalizedValue::List(texts)),
        warnings,
    }
}
