//! Maps an SMTP recipient reply to a verdict kind.
//!
//! Status codes decide first. Within the permanent-failure range the reply
//! text is searched for phrases that servers use for "no such mailbox", since
//! many of them answer every rejection with the same generic code.

use std::fmt;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// Phrases that turn a 55x rejection into "mailbox does not exist".
pub const MAILBOX_MISSING_KEYWORDS: &[&str] = &[
    "user not found",
    "user unknown",
    "no such user",
    "mailbox not found",
    "mailbox unavailable",
    "recipient rejected",
    "address rejected",
    "does not exist",
    "invalid recipient",
    "unknown user",
    "no mailbox",
    "5.1.1",
];

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerdictKind {
    Valid,
    Invalid,
    UserNotFound,
    CatchAll,
    Disposable,
    RoleBased,
    Blocklisted,
    Unknown,
}

impl VerdictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::UserNotFound => "user_not_found",
            Self::CatchAll => "catch_all",
            Self::Disposable => "disposable",
            Self::RoleBased => "role_based",
            Self::Blocklisted => "blocklisted",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: VerdictKind,
    pub reason: String,
}

impl Classification {
    fn new(kind: VerdictKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Classifies a `RCPT TO` reply. Total over every code; code 0 stands for
/// "no definitive response" and maps to [`VerdictKind::Unknown`].
pub fn classify(code: u16, message: &str) -> Classification {
    match code {
        250 | 251 => Classification::new(VerdictKind::Valid, "mailbox verified via SMTP"),
        550 | 551 | 553 | 554 => {
            if mentions_missing_mailbox(message) {
                Classification::new(VerdictKind::UserNotFound, "mailbox does not exist")
            } else {
                Classification::new(VerdictKind::Invalid, format!("email rejected (code {code})"))
            }
        }
        552 => Classification::new(VerdictKind::Invalid, "mailbox full or policy restriction"),
        450..=452 => Classification::new(
            VerdictKind::Unknown,
            "temporary failure - greylisting or rate limit",
        ),
        421 => Classification::new(VerdictKind::Unknown, "service temporarily unavailable"),
        0 => Classification::new(VerdictKind::Unknown, "no definitive SMTP response"),
        other => Classification::new(VerdictKind::Unknown, format!("unhandled SMTP code: {other}")),
    }
}

fn mentions_missing_mailbox(message: &str) -> bool {
    let lower = message.to_lowercase();
    MAILBOX_MISSING_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepted_codes_are_valid() {
        assert_eq!(classify(250, "2.1.5 Ok").kind, VerdictKind::Valid);
        assert_eq!(classify(251, "User not local; will forward").kind, VerdictKind::Valid);
    }

    #[test]
    fn keyword_turns_rejection_into_user_not_found() {
        let c = classify(550, "5.1.1 <bob@example.com>: Recipient address rejected: User unknown");
        assert_eq!(c.kind, VerdictKind::UserNotFound);
        assert_eq!(c.reason, "mailbox does not exist");
        assert_eq!(classify(554, "NO SUCH USER here").kind, VerdictKind::UserNotFound);
    }

    #[test]
    fn generic_rejection_is_invalid() {
        let c = classify(553, "Relaying denied");
        assert_eq!(c.kind, VerdictKind::Invalid);
        assert_eq!(c.reason, "email rejected (code 553)");
    }

    #[test]
    fn mailbox_full_is_invalid_even_with_keyword() {
        let c = classify(552, "mailbox unavailable: quota exceeded");
        assert_eq!(c.kind, VerdictKind::Invalid);
    }

    #[test]
    fn temporary_codes_are_unknown() {
        for code in [421, 450, 451, 452] {
            assert_eq!(classify(code, "try later").kind, VerdictKind::Unknown, "{code}");
        }
    }

    #[test]
    fn reasons_for_the_listed_codes() {
        let rendered: Vec<String> = [0, 250, 251, 421, 450, 451, 452, 550, 551, 552, 553, 554, 999]
            .into_iter()
            .map(|code| {
                let c = classify(code, "");
                format!("{code} {} {}", c.kind, c.reason)
            })
            .collect();
        insta::assert_snapshot!(rendered.join("\n"), @r"
        0 unknown no definitive SMTP response
        250 valid mailbox verified via SMTP
        251 valid mailbox verified via SMTP
        421 unknown service temporarily unavailable
        450 unknown temporary failure - greylisting or rate limit
        451 unknown temporary failure - greylisting or rate limit
        452 unknown temporary failure - greylisting or rate limit
        550 invalid email rejected (code 550)
        551 invalid email rejected (code 551)
        552 invalid mailbox full or policy restriction
        553 invalid email rejected (code 553)
        554 invalid email rejected (code 554)
        999 unknown unhandled SMTP code: 999
        ");
    }

    proptest! {
        #[test]
        fn classify_is_total(code in any::<u16>(), message in ".*") {
            let c = classify(code, &message);
            prop_assert!(!c.reason.is_empty());
            if !matches!(code, 250 | 251 | 550..=554) {
                prop_assert!(matches!(c.kind, VerdictKind::Unknown));
            }
        }
    }
}
