//! Prompt rendering for the plan generator.

use serde::Serialize;

use crate::CanonicalIntake;

/// Placeholder for answers the respondent did not give.
pub const NOT_SPECIFIED: &str = "not specified";

pub const SYSTEM_PROMPT: &str = "\
You are a sleep coach who specialises in shift workers. \
You write clear, practical sleep plans in plain language. \
Use short sections with headings and bullet points. \
Do not give medical diagnoses; suggest seeing a doctor for persistent problems.";

/// Render the user prompt for `intake`.
///
/// Total and deterministic: every intake, however sparse, yields a complete
/// instruction.
pub fn build_prompt(intake: &CanonicalIntake) -> String {
    let workdays = if intake.workdays.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        intake.workdays.join(", ")
    };

    format!(
        "Create a personalized night shift sleep optimization plan.\n\
         Shift starts at: {start}\n\
         Shift ends at: {end}\n\
         Workdays: {workdays}\n\
         Main sleep challenge: {challenge}\n\
         Plan recipient: {contact}\n\
         \n\
         Cover a daily sleep schedule for workdays and days off, light and \
         caffeine timing, and a wind-down routine after the shift. \
         Make it practical and easy to follow.",
        start = or_placeholder(intake.shift_start.as_deref()),
        end = or_placeholder(intake.shift_end.as_deref()),
        workdays = workdays,
        challenge = or_placeholder(intake.sleep_challenge.as_deref()),
        contact = or_placeholder(intake.contact_address.as_deref()),
    )
}

fn or_placeholder(value: Option<&str>) -> &str {
    value.unwrap_or(NOT_SPECIFIED)
}

/// One call's worth of input for the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    pub submission_id: String,
}

impl GenerationRequest {
    pub fn from_intake(intake: &CanonicalIntake) -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_prompt(intake),
            submission_id: intake.submission_id.clone(),
        }
    }
}
