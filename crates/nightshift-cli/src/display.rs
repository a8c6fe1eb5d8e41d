//! Terminal cards for intakes and stored plans.

use std::fmt::Write;

use nightshift_core::{CanonicalIntake, DeliveryRecord, NormalizationWarning, SemanticRole};

const LABEL_WIDTH: usize = 18;

fn role_label(role: SemanticRole) -> &'static str {
    match role {
        SemanticRole::ShiftStart => "shift start",
        SemanticRole::ShiftEnd => "shift end",
        SemanticRole::Workdays => "workdays",
        SemanticRole::SleepChallenge => "sleep challenge",
        SemanticRole::ContactAddress => "contact address",
    }
}

/// Render an intake as a vertical card, absent answers shown as `-`.
pub fn intake_card(intake: &CanonicalIntake, warnings: &[NormalizationWarning]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== submission {} ===", intake.submission_id);
    out.push('\n');

    let _ = writeln!(out, "Answers");
    for role in SemanticRole::EVALUATION_ORDER {
        let value = intake.value(role).unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "  {:<LABEL_WIDTH$} {}", role_label(role), value);
    }

    if !warnings.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "Warnings ({})", warnings.len());
        for w in warnings {
            let _ = writeln!(out, "  - {w}");
        }
    }
    out
}

pub fn record_card(record: &DeliveryRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", record.key);
    let _ = writeln!(out, "  {:<LABEL_WIDTH$} {}", "submission", record.submission_id);
    let _ = writeln!(
        out,
        "  {:<LABEL_WIDTH$} {}",
        "created",
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out.push('\n');
    out.push_str(record.content.trim_end());
    out.push('\n');
    out
}
