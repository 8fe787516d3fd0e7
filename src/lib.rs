#![forbid(unsafe_code)]
//! mailprobe: mailbox deliverability probing without sending mail.
//!
//! An address goes through local checks (format, blocklist, disposable and
//! role lists), then MX resolution, an SMTP `RCPT TO` probe against the
//! exchangers and, when the recipient is accepted, catch-all detection.
//! See [`Validator`] for the pipeline and [`Config`] for its settings.

pub mod catchall;
pub mod classifier;
pub mod config;
pub mod delay;
pub mod mx;
pub mod pipeline;
pub mod smtp_verify;
pub mod store;
pub mod validator;

pub use catchall::{CatchAllDetector, CatchAllOptions, CatchAllResult, check_catch_all};
pub use classifier::{Classification, VerdictKind, classify};
pub use config::{Config, ConfigError};
pub use delay::{DelayStrategy, NoDelay, RandomDelay};
pub use mx::{Error as MxError, LookupMx, MxHost, SystemResolver, resolve_mx};
pub use pipeline::{BulkOptions, BulkReport, Policy, Settings, Validator, Verdict, validate_bulk};
pub use smtp_verify::{
    DialogError, ProbeOutcome, RecipientProbe, RetryPolicy, SenderIdentity, SmtpDialog, probe,
};
pub use store::{CachedValidator, CatchAllStore, MemoryStore, ResultStore};
pub use validator::{
    Address, FormatError, NormalizedEmail, ValidationMode, ValidationReport, normalize_email,
    validate_email,
};
