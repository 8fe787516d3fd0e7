use std::fmt;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::catchall::CatchAllResult;
use crate::classifier::VerdictKind;
use crate::smtp_verify::ProbeOutcome;

/// Final answer for one address. Built only by the pipeline; `reason` is
/// never empty.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub email: String,
    #[cfg_attr(feature = "with-serde", serde(rename = "status"))]
    pub kind: VerdictKind,
    pub reason: String,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub mx_records: Option<Vec<String>>,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub smtp_response: Option<String>,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub catch_all: Option<CatchAllResult>,
}

impl Verdict {
    pub(crate) fn new(email: impl Into<String>, kind: VerdictKind, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            email: email.into(),
            kind,
            reason: if reason.is_empty() {
                kind.as_str().to_string()
            } else {
                reason
            },
            mx_records: None,
            smtp_response: None,
            catch_all: None,
        }
    }

    pub(crate) fn with_mx(mut self, mx_records: Vec<String>) -> Self {
        self.mx_records = Some(mx_records);
        self
    }

    pub(crate) fn with_smtp(mut self, outcome: &ProbeOutcome) -> Self {
        self.smtp_response = Some(outcome.to_string());
        self
    }

    pub(crate) fn with_catch_all(mut self, result: CatchAllResult) -> Self {
        self.catch_all = Some(result);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.kind == VerdictKind::Valid
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.email, self.kind, self.reason)
    }
}
