//! Payload → [`CanonicalIntake`].
//!
//! Roles are processed in [`SemanticRole::EVALUATION_ORDER`]. For each role
//! the catalog's rules are tried in priority order; the first field found is
//! claimed and coerced. Coercion problems and missing optional roles become
//! warnings; only a missing contact address fails the pass.

use tracing::{debug, warn};

use crate::intake::is_plausible_address;
use crate::{
    CanonicalIntake, Claims, FieldCatalog, IntakeError, NormalizationWarning, NormalizedValue,
    RawField, RawPayload, SemanticRole, coerce, resolve,
};

/// Outcome of a successful normalization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub intake: CanonicalIntake,
    pub warnings: Vec<NormalizationWarning>,
}

#[derive(Debug, Clone, Default)]
pub struct IntakeNormalizer {
    catalog: FieldCatalog,
}

impl IntakeNormalizer {
    pub fn new(catalog: FieldCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    /// Parse and normalize a raw webhook body.
    pub fn normalize_slice(&self, bytes: &[u8]) -> Result<Normalized, IntakeError> {
        let payload = RawPayload::from_slice(bytes)?;
        self.normalize(&payload)
    }

    /// Build the canonical intake for `payload`.
    ///
    /// Pure: the same payload always yields the same record and warnings.
    pub fn normalize(&self, payload: &RawPayload) -> Result<Normalized, IntakeError> {
        let submission_id = payload.submission_id();
        let mut intake = CanonicalIntake::empty(submission_id);
        let mut warnings = Vec::new();
        let mut claims = Claims::default();

        for role in SemanticRole::EVALUATION_ORDER {
            let found = self
                .catalog
                .rules_for(role)
                .into_iter()
                .find_map(|rule| resolve(payload, rule, &claims).map(|field| (rule, field)));

            let Some((rule, field)) = found else {
                warnings.push(NormalizationWarning::Unmatched { role });
                continue;
            };
            debug!(
                submission_id,
                role = %role,
                field = %field.identifier,
                priority = rule.priority,
                "matched field"
            );
            claims.claim(role, field);

            match coerce(field) {
                Ok(coerced) => {
                    warnings.extend(
                        coerced
                            .warnings
                            .into_iter()
                            .map(|error| NormalizationWarning::Coercion { role, error }),
                    );
                    match coerced.value {
                        Some(value) => assign(&mut intake, &mut warnings, role, field, value),
                        None => warnings.push(NormalizationWarning::EmptyAnswer {
                            role,
                            field: field.identifier.clone(),
                        }),
                    }
                }
                Err(error) => warnings.push(NormalizationWarning::Coercion { role, error }),
            }
        }

        for w in &warnings {
            warn!(submission_id, role = %w.role(), "{w}");
        }

        if intake.contact_address.is_none() {
            return Err(IntakeError::MissingRequiredField(SemanticRole::ContactAddress));
        }

        Ok(Normalized { intake, warnings })
    }
}

fn assign(
    intake: &mut CanonicalIntake,
    warnings: &mut Vec<NormalizationWarning>,
    role: SemanticRole,
    field: &RawField,
    value: NormalizedValue,
) {
    match role {
        SemanticRole::Workdays => intake.workdays = into_list(value),
        SemanticRole::ShiftStart => intake.shift_start = Some(into_text(value)),
        SemanticRole::ShiftEnd => intake.shift_end = Some(into_text(value)),
        SemanticRole::SleepChallenge => intake.sleep_challenge = Some(into_text(value)),
        SemanticRole::ContactAddress => {
            let address = into_text(value);
            if is_plausible_address(&address) {
                intake.contact_address = Some(address);
            } else {
                warnings.push(NormalizationWarning::InvalidContactAddress {
                    field: field.identifier.clone(),
                    value: address,
                });
            }
        }
    }
}

fn into_text(value: NormalizedValue) -> String {
    match value {
        NormalizedValue::Text(s) => s,
        NormalizedValue::List(items) => items.join(", "),
    }
}

/// Free-text workdays ("Mon, Wed") are split on commas.
fn into_list(value: NormalizedValue) -> Vec<String> {
    let items: Vec<String> = match value {
        NormalizedValue::Text(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
        NormalizedValue::List(items) => items,
    };
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CoercionError, FieldKind, RawValue};
    use serde_json::json;

    const DAYS: &[(&str, &str)] = &[
        ("d1", "Monday"),
        ("d2", "Tuesday"),
        ("d3", "Wednesday"),
        ("d4", "Thursday"),
        ("d5", "Friday"),
    ];

    const CHALLENGES: &[(&str, &str)] = &[
        ("c1", "Falling asleep"),
        ("c2", "Staying asleep"),
        ("c3", "Waking up tired"),
    ];

    fn scenario_a() -> RawPayload {
        RawPayload::new(
            "sub_a",
            vec![
                RawField::scalar("q1", "What time do you usually start your shift?", "22:00"),
                RawField::scalar("q2", "What time does your shift end?", "06:00"),
                RawField::multi_select("q3", "Which days do you work?", &["d1", "d3", "d5"], DAYS),
                RawField::single_select(
                    "q4",
                    "What\u{2019}s your biggest sleep challenge right now?",
                    "c2",
                    CHALLENGES,
                ),
                RawField::scalar("q5", "Enter your email to receive your personalized plan", "a@example.com"),
            ],
        )
    }

    #[test]
    fn scenario_a_normalizes_every_role() {
        let normalized = IntakeNormalizer::default().normalize(&scenario_a()).unwrap();
        let intake = normalized.intake;
        assert_eq!(intake.shift_start.as_deref(), Some("22:00"));
        assert_eq!(intake.shift_end.as_deref(), Some("06:00"));
        assert_eq!(intake.workdays, vec!["Monday", "Wednesday", "Friday"]);
        assert_eq!(intake.sleep_challenge.as_deref(), Some("Staying asleep"));
        assert_eq!(intake.contact_address.as_deref(), Some("a@example.com"));
        assert_eq!(intake.submission_id, "sub_a");
        assert!(normalized.warnings.is_empty(), "{:?}", normalized.warnings);
    }

    #[test]
    fn normalize_is_idempotent() {
        let normalizer = IntakeNormalizer::default();
        let payload = scenario_a();
        assert_eq!(
            normalizer.normalize(&payload).unwrap(),
            normalizer.normalize(&payload).unwrap()
        );
    }

    #[test]
    fn missing_contact_address_fails() {
        let payload = RawPayload::new(
            "sub_c",
            vec![
                RawField::scalar("q1", "What time do you usually start your shift?", "22:00"),
                RawField::scalar("q2", "Your name", "Sam"),
            ],
        );
        let err = IntakeNormalizer::default().normalize(&payload).unwrap_err();
        assert!(matches!(
            err,
            IntakeError::MissingRequiredField(SemanticRole::ContactAddress)
        ));
    }

    #[test]
    fn implausible_contact_address_fails_as_missing() {
        let payload = RawPayload::new(
            "sub",
            vec![RawField::scalar("q5", "Email", "not-an-address")],
        );
        let err = IntakeNormalizer::default().normalize(&payload).unwrap_err();
        assert!(matches!(err, IntakeError::MissingRequiredField(_)));
    }

    #[test]
    fn blank_contact_address_fails_as_missing() {
        let payload = RawPayload::new("sub", vec![RawField::scalar("q5", "Email", "   ")]);
        let err = IntakeNormalizer::default().normalize(&payload).unwrap_err();
        assert!(matches!(err, IntakeError::MissingRequiredField(_)));
    }

    #[test]
    fn dangling_single_select_leaves_role_absent() {
        let mut payload_fields = scenario_a().fields().to_vec();
        payload_fields[3] = RawField::single_select(
            "q4",
            "What\u{2019}s your biggest sleep challenge right now?",
            "c_removed",
            CHALLENGES,
        );
        let payload = RawPayload::new("sub_d", payload_fields);

        let normalized = IntakeNormalizer::default().normalize(&payload).unwrap();
        assert_eq!(normalized.intake.sleep_challenge, None);
        assert_eq!(normalized.intake.shift_start.as_deref(), Some("22:00"));
        assert_eq!(normalized.intake.workdays.len(), 3);

        let dangling: Vec<_> = normalized
            .warnings
            .iter()
            .filter(|w| {
                matches!(
                    w,
                    NormalizationWarning::Coercion {
                        error: CoercionError::DanglingReference { .. },
                        ..
                    }
                )
            })
            .collect();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].role(), SemanticRole::SleepChallenge);
    }

    #[test]
    fn unknown_multi_select_id_is_dropped_with_warning() {
        let mut fields = scenario_a().fields().to_vec();
        fields[2] = RawField::multi_select("q3", "Which days do you work?", &["d5", "d9", "d2"], DAYS);
        let normalized = IntakeNormalizer::default()
            .normalize(&RawPayload::new("s", fields))
            .unwrap();
        assert_eq!(normalized.intake.workdays, vec!["Friday", "Tuesday"]);
        assert_eq!(
            normalized.warnings,
            vec![NormalizationWarning::Coercion {
                role: SemanticRole::Workdays,
                error: CoercionError::UnknownOptionId {
                    field: "q3".into(),
                    id: "d9".into()
                }
            }]
        );
    }

    #[test]
    fn optional_roles_degrade_to_absent() {
        let payload = RawPayload::new("s", vec![RawField::scalar("e", "Email", "a@example.com")]);
        let normalized = IntakeNormalizer::default().normalize(&payload).unwrap();
        assert_eq!(normalized.intake.shift_start, None);
        assert!(normalized.intake.workdays.is_empty());
        let unmatched: Vec<_> = normalized.warnings.iter().map(|w| w.role()).collect();
        assert_eq!(
            unmatched,
            vec![
                SemanticRole::ShiftStart,
                SemanticRole::ShiftEnd,
                SemanticRole::Workdays,
                SemanticRole::SleepChallenge
            ]
        );
    }

    #[test]
    fn by_kind_fallback_finds_reworded_questions() {
        let payload = RawPayload::new(
            "s",
            vec![
                RawField::scalar("e", "Where should we send it?  (email)", "a@example.com"),
                RawField::multi_select("x1", "When are you on rota?", &["d4"], DAYS),
                RawField::single_select("x2", "What bothers you most?", "c1", CHALLENGES),
            ],
        );
        let intake = IntakeNormalizer::default().normalize(&payload).unwrap().intake;
        assert_eq!(intake.workdays, vec!["Thursday"]);
        assert_eq!(intake.sleep_challenge.as_deref(), Some("Falling asleep"));
    }

    #[test]
    fn one_field_never_fills_two_roles_by_kind() {
        let catalog = FieldCatalog::new(vec![
            crate::MatchRule::by_label(SemanticRole::ContactAddress, "email", 10),
            crate::MatchRule::by_kind(SemanticRole::Workdays, FieldKind::MultiSelect, 10),
            crate::MatchRule::by_kind(SemanticRole::SleepChallenge, FieldKind::MultiSelect, 10),
        ]);
        let payload = RawPayload::new(
            "s",
            vec![
                RawField::scalar("e", "Email", "a@example.com"),
                RawField::multi_select("days", "Days", &["d1"], DAYS),
            ],
        );
        let normalized = IntakeNormalizer::new(catalog).normalize(&payload).unwrap();
        assert_eq!(normalized.intake.workdays, vec!["Monday"]);
        assert_eq!(normalized.intake.sleep_challenge, None);
        assert!(normalized.warnings.contains(&NormalizationWarning::Unmatched {
            role: SemanticRole::SleepChallenge
        }));
    }

    #[test]
    fn label_mentioning_days_stays_with_its_own_role() {
        let payload = RawPayload::new(
            "s",
            vec![
                RawField::single_select(
                    "q_challenge",
                    "What is your biggest sleep challenge these days?",
                    "c2",
                    CHALLENGES,
                ),
                RawField::multi_select("q_days", "Which days do you work?", &["d2", "d4"], DAYS),
                RawField::scalar("e", "Email", "a@example.com"),
            ],
        );
        let intake = IntakeNormalizer::default().normalize(&payload).unwrap().intake;
        assert_eq!(intake.workdays, vec!["Tuesday", "Thursday"]);
        assert_eq!(intake.sleep_challenge.as_deref(), Some("Staying asleep"));
    }

    #[test]
    fn label_rules_respect_earlier_claims() {
        let catalog = FieldCatalog::new(vec![
            crate::MatchRule::by_label(SemanticRole::ContactAddress, "email", 10),
            crate::MatchRule::by_label(SemanticRole::ShiftStart, "shift", 10),
            crate::MatchRule::by_label(SemanticRole::ShiftEnd, "shift", 10),
        ]);
        let payload = RawPayload::new(
            "s",
            vec![
                RawField::scalar("e", "Email", "a@example.com"),
                RawField::scalar("q1", "Shift start", "22:00"),
            ],
        );
        let normalized = IntakeNormalizer::new(catalog).normalize(&payload).unwrap();
        assert_eq!(normalized.intake.shift_start.as_deref(), Some("22:00"));
        assert_eq!(normalized.intake.shift_end, None);
        assert!(normalized.warnings.contains(&NormalizationWarning::Unmatched {
            role: SemanticRole::ShiftEnd
        }));
    }

    #[test]
    fn ranking_field_yields_option_text() {
        let body = json!({
            "data": {
                "submissionId": "sub_r",
                "fields": [
                    {"key": "q_email", "label": "Email", "type": "INPUT_EMAIL", "value": "a@example.com"},
                    {
                        "key": "q_rank", "label": "Rank your sleep challenges", "type": "RANKING",
                        "value": ["opt_b", "opt_a"],
                        "options": [
                            {"id": "opt_a", "text": "Falling asleep"},
                            {"id": "opt_b", "text": "Staying asleep"}
                        ]
                    }
                ]
            }
        });
        let intake = IntakeNormalizer::default()
            .normalize_slice(body.to_string().as_bytes())
            .unwrap()
            .intake;
        assert_eq!(intake.sleep_challenge.as_deref(), Some("Staying asleep"));
    }

    #[test]
    fn pinned_identifier_beats_label_rules() {
        let catalog = FieldCatalog::builtin().with_pinned(SemanticRole::ShiftStart, "q_real_start");
        let payload = RawPayload::new(
            "s",
            vec![
                RawField::scalar("e", "Email", "a@example.com"),
                RawField::scalar("q_old", "When do you start your shift? (old)", "20:00"),
                RawField::scalar("q_real_start", "Clock-in", "23:00"),
            ],
        );
        let intake = IntakeNormalizer::new(catalog).normalize(&payload).unwrap().intake;
        assert_eq!(intake.shift_start.as_deref(), Some("23:00"));
    }

    #[test]
    fn free_text_workdays_are_split() {
        let payload = RawPayload::new(
            "s",
            vec![
                RawField::scalar("e", "Email", "a@example.com"),
                RawField::scalar("w", "Which days do you work?", "Mon, Tue ,, Mon"),
            ],
        );
        let intake = IntakeNormalizer::default().normalize(&payload).unwrap().intake;
        assert_eq!(intake.workdays, vec!["Mon", "Tue"]);
    }

    #[test]
    fn unanswered_field_is_reported() {
        let mut start = RawField::scalar("q1", "Shift start", "");
        start.value = Some(RawValue::Text("  ".into()));
        let payload = RawPayload::new("s", vec![RawField::scalar("e", "Email", "a@example.com"), start]);
        let normalized = IntakeNormalizer::default().normalize(&payload).unwrap();
        assert!(normalized.warnings.contains(&NormalizationWarning::EmptyAnswer {
            role: SemanticRole::ShiftStart,
            field: "q1".into()
        }));
    }

    #[test]
    fn normalize_slice_parses_webhook_body() {
        let body = json!({
            "eventId": "evt_7",
            "data": {
                "fields": [
                    {"key": "q_email", "label": "Enter your email to receive your personalized plan", "type": "INPUT_EMAIL", "value": " B@Example.com "},
                    {"key": "q_end", "label": "What time does your shift end?", "type": "INPUT_TIME", "value": "07:30"}
                ]
            }
        });
        let normalized = IntakeNormalizer::default()
            .normalize_slice(body.to_string().as_bytes())
            .unwrap();
        assert_eq!(normalized.intake.submission_id, "evt_7");
        assert_eq!(normalized.intake.contact_address.as_deref(), Some("B@Example.com"));
        assert_eq!(normalized.intake.shift_end.as_deref(), Some("07:30"));
    }
}
