use std::time::Instant;

use crate::mx::MxHost;
use crate::smtp_verify::dialog::RecipientProbe;
use crate::smtp_verify::error::DialogError;
use crate::smtp_verify::options::RetryPolicy;
use crate::smtp_verify::types::ProbeOutcome;

/// Asks the exchangers of `hosts`, in order, whether they accept `recipient`.
///
/// Each host gets up to `policy.per_host_retries` attempts; only transient
/// failures are retried, after `policy.retry_delay`. The first definitive
/// (non-zero) code ends the probe. When every host is exhausted the outcome
/// has code 0 and a message listing each failure.
pub fn probe<P>(
    prober: &P,
    recipient: &str,
    hosts: &[MxHost],
    policy: &RetryPolicy,
) -> ProbeOutcome
where
    P: RecipientProbe + ?Sized,
{
    let mut failures: Vec<String> = Vec::new();

    for host in hosts.iter().take(policy.host_limit()) {
        match probe_host(prober, recipient, &host.exchange, policy) {
            HostResult::Answered(outcome) => {
                tracing::info!(
                    host = %host.exchange,
                    code = outcome.code,
                    "definitive answer for {recipient}"
                );
                return outcome;
            }
            HostResult::Failed(reason) => {
                tracing::warn!(host = %host.exchange, "{reason}, trying next MX");
                failures.push(format!("{}: {reason}", host.exchange));
            }
            HostResult::DeadlineExceeded => {
                failures.push(format!("{}: {}", host.exchange, DialogError::DeadlineExceeded));
                break;
            }
        }
    }

    if failures.is_empty() {
        return ProbeOutcome::no_response("no MX host to probe");
    }
    ProbeOutcome::no_response(failures.join("; "))
}

enum HostResult {
    Answered(ProbeOutcome),
    Failed(String),
    DeadlineExceeded,
}

fn probe_host<P>(prober: &P, recipient: &str, host: &str, policy: &RetryPolicy) -> HostResult
where
    P: RecipientProbe + ?Sized,
{
    let attempts = policy.attempts();

    for attempt in 1..=attempts {
        let Some(timeout) = policy.next_timeout(Instant::now()) else {
            return HostResult::DeadlineExceeded;
        };
        let failure = match prober.attempt(host, recipient, timeout) {
            Ok(outcome) if outcome.is_definitive() => return HostResult::Answered(outcome),
            Ok(outcome) => format!("no definitive response: {}", outcome.message),
            Err(err) if err.is_transient() => err.to_string(),
            Err(err) => return HostResult::Failed(err.to_string()),
        };
        if attempt == attempts {
            return HostResult::Failed(format!("{failure} after {attempts} attempt(s)"));
        }
        if !policy.leaves_time_after(policy.retry_delay, Instant::now()) {
            tracing::warn!(host, attempt, "{failure}, no time left to retry");
            return HostResult::DeadlineExceeded;
        }
        tracing::warn!(
            host,
            attempt,
            attempts,
            "{failure}, retrying in {:?}",
            policy.retry_delay
        );
        if !policy.retry_delay.is_zero() {
            std::thread::sleep(policy.retry_delay);
        }
    }
    HostResult::Failed("no attempt made".to_string())
}
