//! Pipeline stages. Each gate either stops the pipeline with a verdict or
//! hands the next stage what it needs.

use std::ops::ControlFlow;

use crate::classifier::VerdictKind;
use crate::mx::{self, LookupMx, MxHost};
use crate::validator::Address;

use super::{Policy, Verdict};

pub(super) fn format(email: &str) -> ControlFlow<Verdict, Address> {
    match Address::parse(email) {
        Ok(address) => ControlFlow::Continue(address),
        Err(err) => {
            tracing::debug!(reasons = ?err.reasons, "format gate rejected {email:?}");
            ControlFlow::Break(Verdict::new(
                email.trim(),
                VerdictKind::Invalid,
                "invalid email format",
            ))
        }
    }
}

pub(super) fn blocklist(policy: &Policy, address: &Address) -> ControlFlow<Verdict> {
    if policy.is_blocklisted(address.domain()) {
        tracing::debug!(domain = address.domain(), "blocklist gate matched");
        return ControlFlow::Break(Verdict::new(
            address.to_string(),
            VerdictKind::Blocklisted,
            "domain is blocklisted",
        ));
    }
    ControlFlow::Continue(())
}

pub(super) fn disposable(policy: &Policy, address: &Address) -> ControlFlow<Verdict> {
    if policy.is_disposable(address.domain()) {
        tracing::debug!(domain = address.domain(), "disposable gate matched");
        return ControlFlow::Break(Verdict::new(
            address.to_string(),
            VerdictKind::Disposable,
            "disposable email address",
        ));
    }
    ControlFlow::Continue(())
}

pub(super) fn role(policy: &Policy, address: &Address) -> ControlFlow<Verdict> {
    if policy.is_role_based(address.local()) {
        tracing::debug!(local = address.local(), "role gate matched");
        return ControlFlow::Break(Verdict::new(
            address.to_string(),
            VerdictKind::RoleBased,
            "role-based email address",
        ));
    }
    ControlFlow::Continue(())
}

/// A missing domain or a domain without exchangers is final; any other
/// resolver failure only means we could not tell.
pub(super) fn mail_exchangers(
    resolver: &dyn LookupMx,
    address: &Address,
) -> ControlFlow<Verdict, Vec<MxHost>> {
    match mx::resolve_with(resolver, address.domain()) {
        Ok(hosts) => ControlFlow::Continue(hosts),
        Err(err) => {
            let kind = if err.is_domain_missing() {
                VerdictKind::Invalid
            } else {
                VerdictKind::Unknown
            };
            tracing::debug!(domain = address.domain(), %kind, "MX gate: {err}");
            ControlFlow::Break(Verdict::new(address.to_string(), kind, err.to_string()))
        }
    }
}

pub(super) fn smtp_skip(
    policy: &Policy,
    address: &Address,
    records: &[String],
) -> ControlFlow<Verdict> {
    if policy.skips_smtp(address.domain()) {
        tracing::debug!(domain = address.domain(), "SMTP probe skipped by policy");
        return ControlFlow::Break(
            Verdict::new(
                address.to_string(),
                VerdictKind::Unknown,
                format!(
                    "SMTP validation skipped for {} (port 25 blocked by provider)",
                    address.domain()
                ),
            )
            .with_mx(records.to_vec()),
        );
    }
    ControlFlow::Continue(())
}
