//! Delivery keys.
//!
//! A plan is stored and overwritten under the respondent's contact address,
//! folded to a canonical form so that `A@Example.com ` and `a@example.com`
//! land on the same record.
//!
//! # On-disk encoding
//!
//! Keys become file stems, so they are encoded reversibly:
//!
//! - `a-z`, `0-9`, `.`, `_`, `@`, `+`, `-` pass through unchanged
//! - every other byte is written as `%XX` (uppercase hex)
//! - a leading `.` is escaped so a stem is never hidden or `..`
//!
//! Distinct keys always produce distinct stems.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CanonicalIntake;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryKey(String);

impl DeliveryKey {
    /// Canonical key for a contact address: trimmed and lowercased.
    ///
    /// Returns `None` for a blank address.
    pub fn from_address(address: &str) -> Option<Self> {
        let canonical = address.trim().to_lowercase();
        (!canonical.is_empty()).then_some(Self(canonical))
    }

    /// Key for an intake: its contact address, else its submission id.
    pub fn for_intake(intake: &CanonicalIntake) -> Self {
        intake
            .contact_address
            .as_deref()
            .and_then(Self::from_address)
            .unwrap_or_else(|| Self(format!("submission:{}", intake.submission_id.trim())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode the key as a file-name-safe stem.
    pub fn file_stem(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for (i, b) in self.0.bytes().enumerate() {
            let keep = matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_' | b'@' | b'+' | b'-')
                || (b == b'.' && i > 0);
            if keep {
                out.push(b as char);
            } else {
                out.push_str(&format!("%{b:02X}"));
            }
        }
        out
    }

    /// Decode a stem produced by [`file_stem`](Self::file_stem).
    ///
    /// Returns `None` for malformed escapes or non-UTF-8 results.
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let bytes = stem.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                let hex = stem.get(i + 1..i + 3)?;
                if !hex.bytes().all(|h| h.is_ascii_hexdigit()) {
                    return None;
                }
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        }
        let decoded = String::from_utf8(out).ok()?;
        (!decoded.is_empty()).then_some(Self(decoded))
    }
}

impl fmt::Display for DeliveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
