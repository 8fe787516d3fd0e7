//! Catch-all detection.
//!
//! A domain whose exchangers accept any recipient makes a `250` to `RCPT TO`
//! meaningless. The detector probes addresses that cannot exist and reports a
//! catch-all when the share of accepted probes reaches the threshold.

use std::collections::HashSet;
use std::time::{Duration, Instant};

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::delay::{self, DelayStrategy};
use crate::mx::MxHost;
use crate::smtp_verify::{self, MAX_PROBED_HOSTS, RecipientProbe, RetryPolicy, random_local_part};

const PROBE_LOCAL_LEN: usize = 20;

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatchAllResult {
    pub is_catch_all: bool,
    pub positive_ratio: f64,
    pub probes_sent: u32,
}

impl CatchAllResult {
    fn skipped() -> Self {
        Self {
            is_catch_all: false,
            positive_ratio: 0.0,
            probes_sent: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatchAllOptions {
    pub attempts_per_host: u32,
    pub threshold: f64,
    pub max_hosts: usize,
    /// Providers known never to behave as catch-all; never probed.
    pub excluded: HashSet<String>,
    pub policy: RetryPolicy,
}

impl Default for CatchAllOptions {
    fn default() -> Self {
        Self {
            attempts_per_host: 3,
            threshold: 0.8,
            max_hosts: MAX_PROBED_HOSTS,
            excluded: HashSet::new(),
            policy: RetryPolicy::single_attempt(Duration::from_secs(10)),
        }
    }
}

/// A detection pass, with whether the deadline interrupted it. A cut pass
/// only counts the attempts that reached an exchanger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Detection {
    pub result: CatchAllResult,
    pub cut_short: bool,
}

pub struct CatchAllDetector<'a, P: ?Sized> {
    prober: &'a P,
    delay: &'a dyn DelayStrategy,
    options: &'a CatchAllOptions,
}

impl<'a, P> CatchAllDetector<'a, P>
where
    P: RecipientProbe + ?Sized,
{
    pub fn new(prober: &'a P, delay: &'a dyn DelayStrategy, options: &'a CatchAllOptions) -> Self {
        Self {
            prober,
            delay,
            options,
        }
    }

    pub fn check(&self, hosts: &[MxHost], domain: &str) -> CatchAllResult {
        self.detect(hosts, domain).result
    }

    /// Stops as soon as `options.policy.deadline` leaves no room for another
    /// attempt or pause.
    pub(crate) fn detect(&self, hosts: &[MxHost], domain: &str) -> Detection {
        let domain = domain.trim().to_ascii_lowercase();
        if self.options.excluded.contains(&domain) {
            tracing::debug!(%domain, "catch-all check skipped: excluded provider");
            return Detection {
                result: CatchAllResult::skipped(),
                cut_short: false,
            };
        }

        let hosts: Vec<&MxHost> = hosts
            .iter()
            .take(self.options.max_hosts.min(MAX_PROBED_HOSTS))
            .collect();
        let total = hosts.len() as u32 * self.options.attempts_per_host;
        tracing::info!(%domain, hosts = hosts.len(), total, "starting catch-all detection");

        let policy = &self.options.policy;
        let mut positives = 0u32;
        let mut sent = 0u32;
        let mut cut_short = false;
        'hosts: for host in &hosts {
            // disposable probes: one host at a time, no fallback
            let single = std::slice::from_ref(*host);
            for _ in 0..self.options.attempts_per_host {
                if sent > 0 && !delay::pause_before(self.delay, policy.deadline) {
                    cut_short = true;
                    break 'hosts;
                }
                if policy.next_timeout(Instant::now()).is_none() {
                    cut_short = true;
                    break 'hosts;
                }
                let fake = format!("{}@{domain}", random_local_part(PROBE_LOCAL_LEN));
                let outcome = smtp_verify::probe(self.prober, &fake, single, policy);
                if !outcome.is_definitive() && policy.next_timeout(Instant::now()).is_none() {
                    // the failure may be the deadline itself, so it proves nothing
                    cut_short = true;
                    break 'hosts;
                }
                sent += 1;
                if outcome.is_accepted() {
                    positives += 1;
                } else if !outcome.is_definitive() {
                    tracing::warn!(host = %host.exchange, "catch-all probe failed: {}", outcome.message);
                } else {
                    tracing::debug!(host = %host.exchange, code = outcome.code, "catch-all probe rejected");
                }
            }
        }

        let result = evaluate(positives, total, self.options.threshold, sent);
        if cut_short {
            tracing::warn!(%domain, sent, total, "catch-all detection cut short by the deadline");
        }
        tracing::info!(
            %domain,
            positives,
            total,
            ratio = result.positive_ratio,
            catch_all = result.is_catch_all,
            "catch-all detection finished"
        );
        Detection { result, cut_short }
    }
}

/// `ratio = positives / total`, catch-all when `ratio >= threshold`. No
/// attempts means ratio 0 and no catch-all.
pub fn evaluate(positives: u32, total: u32, threshold: f64, probes_sent: u32) -> CatchAllResult {
    let positive_ratio = if total == 0 {
        0.0
    } else {
        f64::from(positives) / f64::from(total)
    };
    CatchAllResult {
        is_catch_all: total > 0 && positive_ratio >= threshold,
        positive_ratio,
        probes_sent,
    }
}

/// Convenience wrapper returning only the decision.
pub fn check_catch_all<P>(
    prober: &P,
    delay: &dyn DelayStrategy,
    hosts: &[MxHost],
    domain: &str,
    options: &CatchAllOptions,
) -> bool
where
    P: RecipientProbe + ?Sized,
{
    CatchAllDetector::new(prober, delay, options)
        .check(hosts, domain)
        .is_catch_all
}
