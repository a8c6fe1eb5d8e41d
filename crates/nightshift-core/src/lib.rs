//! Core types for Nightshift: webhook payload model, semantic field catalog,
//! intake normalization, prompt building, and delivery keys.

pub mod catalog;
pub mod coerce;
mod error;
pub mod intake;
pub mod key;
pub mod normalize;
pub mod payload;
pub mod prompt;
pub mod record;
pub mod resolve;

pub use catalog::{FieldCatalog, MatchRule, MatchStrategy, SemanticRole};
pub use coerce::{Coerced, NormalizedValue, coerce};
pub use error::{CoercionError, IntakeError};
pub use intake::{CanonicalIntake, NormalizationWarning};
pub use key::DeliveryKey;
pub use normalize::{IntakeNormalizer, Normalized};
pub use payload::{FieldKind, RawField, RawPayload, RawValue, SelectOption};
pub use prompt::{GenerationRequest, NOT_SPECIFIED, SYSTEM_PROMPT, build_prompt};
pub use record::DeliveryRecord;
pub use resolve::{Claims, resolve};
