//! Single-rule field lookup.

use std::collections::HashMap;

use crate::{MatchRule, MatchStrategy, RawField, RawPayload, SemanticRole};

/// Fields already taken by a role during one normalization pass.
///
/// Both the identifier and the trimmed label are recorded, so neither a
/// label nor a `ByKind` rule can hand the same question to a second role.
/// Pinned identifiers ignore claims.
#[derive(Debug, Default, Clone)]
pub struct Claims {
    identifiers: HashMap<String, SemanticRole>,
    labels: HashMap<String, SemanticRole>,
}

impl Claims {
    pub fn claim(&mut self, role: SemanticRole, field: &RawField) {
        self.identifiers.insert(field.identifier.clone(), role);
        let label = normalize_label(&field.label);
        if !label.is_empty() {
            self.labels.insert(label, role);
        }
    }

    /// Whether `field` was claimed by a role other than `role`.
    pub fn is_claimed_by_other(&self, role: SemanticRole, field: &RawField) -> bool {
        let by_id = self.identifiers.get(&field.identifier);
        let by_label = self.labels.get(&normalize_label(&field.label));
        [by_id, by_label]
            .into_iter()
            .flatten()
            .any(|owner| *owner != role)
    }
}

/// Find the first field in payload order that satisfies `rule`.
pub fn resolve<'p>(payload: &'p RawPayload, rule: &MatchRule, claims: &Claims) -> Option<&'p RawField> {
    let mut fields = payload.fields().iter();
    match &rule.strategy {
        MatchStrategy::ByIdentifier(id) => fields.find(|f| f.identifier == *id),
        MatchStrategy::ByLabelSubstring {
            pattern,
            case_insensitive,
        } => {
            let pattern = normalize_label(pattern);
            if pattern.is_empty() {
                return None;
            }
            let pattern = if *case_insensitive {
                pattern.to_lowercase()
            } else {
                pattern
            };
            fields.find(|f| {
                let label = normalize_label(&f.label);
                let label = if *case_insensitive {
                    label.to_lowercase()
                } else {
                    label
                };
                label.contains(&pattern) && !claims.is_claimed_by_other(rule.role, f)
            })
        }
        MatchStrategy::ByKind(kind) => fields
            .find(|f| f.kind == *kind && !claims.is_claimed_by_other(rule.role, f)),
    }
}

/// Trim and fold typographic quotes to ASCII. Form builders swap `'` for `’`
/// when a label is edited in their rich-text editor.
fn normalize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect()
}
