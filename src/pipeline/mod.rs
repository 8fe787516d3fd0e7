//! Validation orchestrator.
//!
//! [`Validator`] runs the gates in a fixed order: format, blocklist,
//! disposable, role, MX resolution, SMTP skip-list, SMTP probe and finally
//! catch-all detection for accepted recipients. The first gate that reaches a
//! conclusion produces the [`Verdict`].

pub mod bulk;
mod gates;
mod policy;
mod verdict;

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

pub use bulk::{BulkOptions, BulkReport, validate_bulk};
pub use policy::Policy;
pub(crate) use policy::{normalized_domains, normalized_set};
pub use verdict::Verdict;

use crate::catchall::{CatchAllDetector, CatchAllOptions, CatchAllResult, Detection};
use crate::classifier::{self, VerdictKind};
use crate::delay::{DelayStrategy, RandomDelay};
use crate::mx::{self, LookupMx, MxHost, SystemResolver};
use crate::smtp_verify::{
    self, DialogOptions, RecipientProbe, RetryPolicy, SenderIdentity, SmtpDialog,
};
use crate::store::CatchAllStore;
use crate::validator::Address;

/// Tunables of the network stages.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub retry: RetryPolicy,
    pub catch_all: CatchAllOptions,
}

pub struct Validator {
    policy: Policy,
    settings: Settings,
    resolver: Arc<dyn LookupMx>,
    prober: Arc<dyn RecipientProbe>,
    delay: Arc<dyn DelayStrategy>,
    catch_all_cache: Option<Arc<dyn CatchAllStore>>,
}

impl Validator {
    /// `policy.catch_all_excluded` is merged into the catch-all options.
    pub fn new(
        policy: Policy,
        mut settings: Settings,
        resolver: Arc<dyn LookupMx>,
        prober: Arc<dyn RecipientProbe>,
        delay: Arc<dyn DelayStrategy>,
    ) -> Self {
        settings
            .catch_all
            .excluded
            .extend(policy.catch_all_excluded.iter().cloned());
        Self {
            policy,
            settings,
            resolver,
            prober,
            delay,
            catch_all_cache: None,
        }
    }

    /// Built-in lists, system DNS, a real SMTP dialog on port 25 and
    /// 200..=1000 ms between catch-all probes.
    pub fn with_defaults() -> Self {
        Self::new(
            Policy::default(),
            Settings::default(),
            Arc::new(SystemResolver::default()),
            Arc::new(SmtpDialog::new(SenderIdentity::default(), DialogOptions::default())),
            Arc::new(RandomDelay::from_millis(200, 1_000)),
        )
    }

    /// Reuse catch-all results per domain through `store`.
    pub fn with_catch_all_store(mut self, store: Arc<dyn CatchAllStore>) -> Self {
        self.catch_all_cache = Some(store);
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn validate_blocking(&self, email: &str) -> Verdict {
        self.run(email, None)
    }

    /// Same as [`Validator::validate_blocking`], but no SMTP attempt starts
    /// after `deadline` and none outlives it.
    pub fn validate_until(&self, email: &str, deadline: Instant) -> Verdict {
        self.run(email, Some(deadline))
    }

    /// Local gates run inline; DNS and SMTP run on the blocking pool.
    pub async fn validate(self: &Arc<Self>, email: &str) -> Verdict {
        tracing::info!(email, "validation started");
        let address = match self.local_gates(email) {
            ControlFlow::Break(verdict) => return finish(verdict),
            ControlFlow::Continue(address) => address,
        };

        let this = Arc::clone(self);
        let shown = address.to_string();
        match tokio::task::spawn_blocking(move || this.network_gates(&address, None)).await {
            Ok(verdict) => finish(verdict),
            Err(err) => {
                tracing::error!(email = %shown, "validation task failed: {err}");
                finish(Verdict::new(
                    shown,
                    VerdictKind::Unknown,
                    format!("validation task failed: {err}"),
                ))
            }
        }
    }

    /// Standalone catch-all check for `domain`, resolving its exchangers
    /// first.
    pub fn check_catch_all_domain(&self, domain: &str) -> Result<CatchAllResult, mx::Error> {
        let ascii = mx::normalize_domain(domain)?.to_ascii_lowercase();
        let hosts = mx::resolve_with(self.resolver.as_ref(), &ascii)?;
        Ok(self.catch_all(&hosts, &ascii, &self.settings.catch_all).result)
    }

    fn run(&self, email: &str, deadline: Option<Instant>) -> Verdict {
        tracing::info!(email, "validation started");
        let verdict = match self.local_gates(email) {
            ControlFlow::Break(verdict) => verdict,
            ControlFlow::Continue(address) => self.network_gates(&address, deadline),
        };
        finish(verdict)
    }

    fn local_gates(&self, email: &str) -> ControlFlow<Verdict, Address> {
        let address = gates::format(email)?;
        gates::blocklist(&self.policy, &address)?;
        gates::disposable(&self.policy, &address)?;
        gates::role(&self.policy, &address)?;
        ControlFlow::Continue(address)
    }

    fn network_gates(&self, address: &Address, deadline: Option<Instant>) -> Verdict {
        match self.probe_gates(address, deadline) {
            ControlFlow::Break(verdict) | ControlFlow::Continue(verdict) => verdict,
        }
    }

    fn probe_gates(
        &self,
        address: &Address,
        deadline: Option<Instant>,
    ) -> ControlFlow<Verdict, Verdict> {
        let hosts = gates::mail_exchangers(self.resolver.as_ref(), address)?;
        let records = mx::exchanges(&hosts);
        gates::smtp_skip(&self.policy, address, &records)?;

        let mut retry = self.settings.retry.clone();
        retry.deadline = deadline;
        let recipient = address.to_string();
        let outcome = smtp_verify::probe(self.prober.as_ref(), &recipient, &hosts, &retry);
        let base = |kind, reason: String| {
            Verdict::new(recipient.clone(), kind, reason)
                .with_mx(records.clone())
                .with_smtp(&outcome)
        };

        if !outcome.is_definitive() {
            return ControlFlow::Break(base(
                VerdictKind::Unknown,
                format!("all MX servers unresponsive: {}", outcome.message),
            ));
        }

        let classification = classifier::classify(outcome.code, &outcome.message);
        tracing::debug!(code = outcome.code, kind = %classification.kind, "SMTP reply classified");
        if outcome.code != 250 {
            return ControlFlow::Break(base(classification.kind, classification.reason));
        }

        let mut catch_all = self.settings.catch_all.clone();
        catch_all.policy.deadline = deadline;
        let detection = self.catch_all(&hosts, address.domain(), &catch_all);
        let result = detection.result;
        let verdict = if result.is_catch_all {
            base(
                VerdictKind::CatchAll,
                "domain accepts all emails (catch-all)".to_string(),
            )
        } else if detection.cut_short {
            base(
                VerdictKind::Unknown,
                "catch-all detection cut short by the deadline".to_string(),
            )
        } else {
            base(classification.kind, classification.reason)
        };
        ControlFlow::Continue(verdict.with_catch_all(result))
    }

    fn catch_all(&self, hosts: &[MxHost], domain: &str, options: &CatchAllOptions) -> Detection {
        if let Some(hit) = self.catch_all_cache.as_ref().and_then(|cache| cache.get(domain)) {
            tracing::debug!(domain, "catch-all result served from store");
            return Detection {
                result: hit,
                cut_short: false,
            };
        }
        let detection = CatchAllDetector::new(self.prober.as_ref(), self.delay.as_ref(), options)
            .detect(hosts, domain);
        // skipped and interrupted passes prove nothing about the domain
        if let Some(cache) = &self.catch_all_cache {
            if !detection.cut_short && detection.result.probes_sent > 0 {
                cache.upsert(domain, detection.result);
            }
        }
        detection
    }
}

fn finish(verdict: Verdict) -> Verdict {
    tracing::info!(email = %verdict.email, kind = %verdict.kind, "verdict: {}", verdict.reason);
    verdict
}

#[cfg(test)]
mod tests;
