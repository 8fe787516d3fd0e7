use std::fmt;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// A raw SMTP reply: status code plus the text of every line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn has_capability(&self, cap: &str) -> bool {
        self.lines.iter().any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|token| token.eq_ignore_ascii_case(cap))
        })
    }

    /// All lines joined with a single space.
    pub fn message(&self) -> String {
        self.lines.join(" ")
    }
}

/// Result of one recipient probe. `code == 0` means no host gave a
/// definitive answer and `message` then aggregates the failures.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub code: u16,
    pub message: String,
    pub host: Option<String>,
}

impl ProbeOutcome {
    pub fn answered(host: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            host: Some(host.into()),
        }
    }

    pub fn no_response(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: message.into(),
            host: None,
        }
    }

    pub fn is_definitive(&self) -> bool {
        self.code != 0
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.code, 250 | 251)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}
