//! SMTP recipient probing.
//!
//! [`probe`] drives a [`RecipientProbe`] over an ordered list of exchangers
//! with a bounded retry budget. [`SmtpDialog`] is the network implementation:
//! a fresh connection per attempt, opportunistic STARTTLS, then `MAIL FROM`
//! and `RCPT TO` with the reply captured verbatim.

mod dialog;
mod error;
mod options;
mod probe;
mod session;
mod types;
mod util;

pub use dialog::{RecipientProbe, SmtpDialog};
pub use error::DialogError;
pub use options::{DialogOptions, MAX_PROBED_HOSTS, RetryPolicy, SenderIdentity};
pub use probe::probe;
pub use types::{ProbeOutcome, SmtpReply};
pub use util::random_local_part;
