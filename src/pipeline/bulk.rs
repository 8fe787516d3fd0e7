//! Bulk validation.
//!
//! Addresses are grouped by domain. Groups run concurrently, bounded by
//! `max_concurrent_domains`; inside a group addresses are validated one after
//! the other with a randomized pause between consecutive probes so that a
//! single destination never sees a burst.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;

#[cfg(feature = "with-serde")]
use serde::Serialize;

use crate::delay::{DelayStrategy, RandomDelay};
use crate::store::{ResultStore, store_key};

use super::{Validator, Verdict};

#[derive(Clone)]
pub struct BulkOptions {
    pub max_concurrent_domains: usize,
    /// Pause between consecutive probes to the same domain.
    pub delay: Arc<dyn DelayStrategy>,
    pub store: Option<Arc<dyn ResultStore>>,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            max_concurrent_domains: 8,
            delay: Arc::new(RandomDelay::from_millis(300, 1_000)),
            store: None,
        }
    }
}

#[cfg_attr(feature = "with-serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BulkReport {
    pub total: usize,
    pub valid: usize,
    pub not_valid: usize,
    /// Verdicts served from the store instead of probed.
    pub cached: usize,
    /// One verdict per input address, in input order.
    pub results: Vec<Verdict>,
    #[cfg_attr(feature = "with-serde", serde(with = "millis"))]
    pub elapsed: Duration,
}

struct Entry {
    index: usize,
    email: String,
}

pub async fn validate_bulk(
    validator: &Arc<Validator>,
    emails: Vec<String>,
    options: &BulkOptions,
) -> BulkReport {
    let started = Instant::now();
    let total = emails.len();
    let groups = group_by_domain(emails);
    tracing::info!(total, domains = groups.len(), "bulk validation started");

    let finished: Vec<Vec<(usize, Verdict, bool)>> = futures::stream::iter(groups)
        .map(|group| validate_group(Arc::clone(validator), group, options.clone()))
        .buffer_unordered(options.max_concurrent_domains.max(1))
        .collect()
        .await;

    let mut slots: Vec<Option<Verdict>> = vec![None; total];
    let mut cached = 0;
    for (index, verdict, hit) in finished.into_iter().flatten() {
        if hit {
            cached += 1;
        }
        slots[index] = Some(verdict);
    }
    let results: Vec<Verdict> = slots.into_iter().flatten().collect();
    let valid = results.iter().filter(|verdict| verdict.is_valid()).count();

    let report = BulkReport {
        total,
        valid,
        not_valid: total - valid,
        cached,
        results,
        elapsed: started.elapsed(),
    };
    tracing::info!(
        total,
        valid,
        cached,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "bulk validation finished"
    );
    report
}

async fn validate_group(
    validator: Arc<Validator>,
    group: Vec<Entry>,
    options: BulkOptions,
) -> Vec<(usize, Verdict, bool)> {
    let mut out = Vec::with_capacity(group.len());
    // set once an address of the group has reached an SMTP server
    let mut contacted = false;

    for Entry { index, email } in group {
        let key = store_key(&email);
        if let Some(hit) = options.store.as_ref().and_then(|store| store.get(&key)) {
            out.push((index, hit, true));
            continue;
        }

        if contacted {
            let pause = options.delay.next_delay();
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
        let verdict = validator.validate(&email).await;
        if verdict.smtp_response.is_some() {
            contacted = true;
        }

        if let Some(store) = &options.store {
            store.upsert(&key, verdict.clone());
        }
        out.push((index, verdict, false));
    }
    out
}

/// Groups keep the order of first appearance; so do entries within a group.
/// An address without `@` forms a group of its own.
fn group_by_domain(emails: Vec<String>) -> Vec<Vec<Entry>> {
    let mut groups: Vec<Vec<Entry>> = Vec::new();
    let mut by_domain: HashMap<String, usize> = HashMap::new();

    for (index, email) in emails.into_iter().enumerate() {
        let domain = email
            .trim()
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_lowercase());
        let entry = Entry { index, email };
        match domain {
            Some(domain) => {
                let slot = *by_domain.entry(domain).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
                groups[slot].push(entry);
            }
            None => groups.push(vec![entry]),
        }
    }
    groups
}

#[cfg(feature = "with-serde")]
mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emails(list: &[&str]) -> Vec<String> {
        list.iter().map(|email| email.to_string()).collect()
    }

    #[test]
    fn grouping_is_case_insensitive_and_ordered() {
        let groups = group_by_domain(emails(&[
            "a@one.com",
            "b@two.com",
            "c@ONE.com",
            "garbage",
            "d@two.com",
        ]));
        let indexes: Vec<Vec<usize>> = groups
            .iter()
            .map(|group| group.iter().map(|entry| entry.index).collect())
            .collect();
        assert_eq!(indexes, vec![vec![0, 2], vec![1, 4], vec![3]]);
    }

    #[test]
    fn unparseable_addresses_are_isolated() {
        let groups = group_by_domain(emails(&["nope", "still nope"]));
        assert_eq!(groups.len(), 2);
    }
}
