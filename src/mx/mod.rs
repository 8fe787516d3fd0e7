//! DNS MX resolution.
//!
//! The public entry point is [`resolve_mx`], which performs a blocking lookup
//! and returns the exchangers ordered by preference. [`resolve_with`] applies
//! the same ordering rules to any [`LookupMx`] source.

mod error;
mod resolver;
mod types;

pub use error::MxError as Error;
pub use resolver::{LookupMx, SystemResolver, resolve_mx, resolve_with};
pub use types::{MxHost, exchanges};

pub use resolver::normalize_domain;
