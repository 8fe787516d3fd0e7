use std::fmt;

use thiserror::Error;

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Strict,
    Relaxed,
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub ok: bool,
    pub reasons: Vec<String>,
}

/// Trimmed and lowercased view of an address, valid or not.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEmail {
    pub original: String,
    pub local: String,
    pub domain: String,
    pub ascii_domain: String,
    pub mode: ValidationMode,
    pub valid: bool,
    pub reasons: Vec<String>,
}

/// Malformed address. Always local, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid email format: {}", reasons.join("; "))]
pub struct FormatError {
    pub reasons: Vec<String>,
}

/// An address that passed the format check. Both parts are lowercase and the
/// domain is in its ASCII (punycode) form.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    local: String,
    domain: String,
}

impl Address {
    pub fn parse(email: &str) -> Result<Self, FormatError> {
        let normalized = super::normalize_email(email, ValidationMode::Strict);
        Self::try_from(normalized)
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl TryFrom<NormalizedEmail> for Address {
    type Error = FormatError;

    fn try_from(normalized: NormalizedEmail) -> Result<Self, Self::Error> {
        if !normalized.valid {
            return Err(FormatError {
                reasons: normalized.reasons,
            });
        }
        let domain = if normalized.ascii_domain.is_empty() {
            normalized.domain
        } else {
            normalized.ascii_domain
        };
        Ok(Self {
            local: normalized.local,
            domain,
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}
