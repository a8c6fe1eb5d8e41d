//! Semantic roles and the ordered match rules that locate them in a payload.
//!
//! Forms get edited: keys are regenerated, labels are reworded, a text input
//! becomes a dropdown. Each role therefore carries a fallback chain of rules,
//! tried in ascending priority until one finds a field.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::FieldKind;

/// A fixed meaning an answer can fill, independent of the form's field keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticRole {
    ShiftStart,
    ShiftEnd,
    Workdays,
    SleepChallenge,
    ContactAddress,
}

impl SemanticRole {
    /// Order in which the normalizer claims fields. The contact address goes
    /// first so that a catch-all rule for a later role can never take it.
    pub const EVALUATION_ORDER: [SemanticRole; 5] = [
        Self::ContactAddress,
        Self::ShiftStart,
        Self::ShiftEnd,
        Self::Workdays,
        Self::SleepChallenge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShiftStart => "ShiftStart",
            Self::ShiftEnd => "ShiftEnd",
            Self::Workdays => "Workdays",
            Self::SleepChallenge => "SleepChallenge",
            Self::ContactAddress => "ContactAddress",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Self::ShiftStart => "shift_start",
            Self::ShiftEnd => "shift_end",
            Self::Workdays => "workdays",
            Self::SleepChallenge => "sleep_challenge",
            Self::ContactAddress => "contact_address",
        }
    }

    /// Only the contact address is required; every other role degrades to
    /// absent.
    pub fn is_required(&self) -> bool {
        matches!(self, Self::ContactAddress)
    }
}

impl fmt::Display for SemanticRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemanticRole {
    type Err = String;

    /// Accepts either the role name (`ShiftStart`) or its slug (`shift_start`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::EVALUATION_ORDER
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(wanted) || r.slug() == wanted)
            .ok_or_else(|| format!("unknown role `{wanted}`"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Exact match on the provider field key.
    ByIdentifier(String),
    /// Trimmed label contains `pattern`.
    ByLabelSubstring {
        pattern: String,
        case_insensitive: bool,
    },
    /// First unclaimed field of the given kind.
    ByKind(FieldKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule {
    pub role: SemanticRole,
    pub strategy: MatchStrategy,
    /// Lower runs first.
    pub priority: u32,
}

impl MatchRule {
    pub fn by_identifier(role: SemanticRole, identifier: &str, priority: u32) -> Self {
        Self {
            role,
            strategy: MatchStrategy::ByIdentifier(identifier.to_string()),
            priority,
        }
    }

    /// Case-insensitive label substring rule.
    pub fn by_label(role: SemanticRole, pattern: &str, priority: u32) -> Self {
        Self {
            role,
            strategy: MatchStrategy::ByLabelSubstring {
                pattern: pattern.to_string(),
                case_insensitive: true,
            },
            priority,
        }
    }

    pub fn by_label_exact_case(role: SemanticRole, pattern: &str, priority: u32) -> Self {
        Self {
            role,
            strategy: MatchStrategy::ByLabelSubstring {
                pattern: pattern.to_string(),
                case_insensitive: false,
            },
            priority,
        }
    }

    pub fn by_kind(role: SemanticRole, kind: FieldKind, priority: u32) -> Self {
        Self {
            role,
            strategy: MatchStrategy::ByKind(kind),
            priority,
        }
    }
}

/// Priority given to operator-pinned field keys.
pub const PINNED_PRIORITY: u32 = 0;

/// Registry of match rules for every [`SemanticRole`].
#[derive(Debug, Clone)]
pub struct FieldCatalog {
    rules: Vec<MatchRule>,
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FieldCatalog {
    pub fn new(rules: Vec<MatchRule>) -> Self {
        Self { rules }
    }

    /// Rules matching the wording used by the night-shift questionnaire and
    /// its past revisions.
    pub fn builtin() -> Self {
        use SemanticRole::*;

        Self::new(vec![
            MatchRule::by_label(ContactAddress, "email", 10),
            MatchRule::by_label(ContactAddress, "e-mail", 20),
            MatchRule::by_label(ContactAddress, "contact", 30),
            MatchRule::by_label(ShiftStart, "start your shift", 10),
            MatchRule::by_label(ShiftStart, "shift start", 20),
            MatchRule::by_label(ShiftStart, "shift begin", 30),
            MatchRule::by_label(ShiftStart, "start time", 40),
            MatchRule::by_label(ShiftEnd, "shift end", 10),
            MatchRule::by_label(ShiftEnd, "end your shift", 20),
            MatchRule::by_label(ShiftEnd, "shift finish", 30),
            MatchRule::by_label(ShiftEnd, "end time", 40),
            MatchRule::by_label(Workdays, "days do you work", 10),
            MatchRule::by_label(Workdays, "days you work", 20),
            MatchRule::by_label(Workdays, "workdays", 30),
            MatchRule::by_label(Workdays, "work days", 40),
            MatchRule::by_label(Workdays, "working days", 50),
            MatchRule::by_kind(Workdays, FieldKind::MultiSelect, 90),
            MatchRule::by_label(SleepChallenge, "sleep challenge", 10),
            MatchRule::by_label(SleepChallenge, "challenge", 20),
            MatchRule::by_label(SleepChallenge, "struggle", 30),
            MatchRule::by_kind(SleepChallenge, FieldKind::SingleSelect, 90),
        ])
    }

    /// Pin a provider field key to a role. Pinned rules run before every
    /// other rule for that role.
    pub fn with_pinned(mut self, role: SemanticRole, identifier: &str) -> Self {
        self.rules.insert(
            0,
            MatchRule::by_identifier(role, identifier, PINNED_PRIORITY),
        );
        self
    }

    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    /// Rules for `role` in evaluation order: ascending priority, ties kept in
    /// declaration order.
    pub fn rules_for(&self, role: SemanticRole) -> Vec<&MatchRule> {
        let mut rules: Vec<&MatchRule> = self.rules.iter().filter(|r| r.role == role).collect();
        rules.sort_by_key(|r| r.priority);
        rules
    }
}
