use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::*;
use crate::delay::NoDelay;
use crate::mx::tests::StubResolver;
use crate::smtp_verify::tests::StubProbe;
use crate::smtp_verify::{DialogError, ProbeOutcome};
use crate::store::{CatchAllStore, MemoryStore};

fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.retry.retry_delay = Duration::ZERO;
    settings.retry.attempt_timeout = Duration::from_secs(1);
    settings
}

fn one_mx() -> Arc<StubResolver> {
    Arc::new(StubResolver::new(|domain| {
        Ok(vec![MxHost::new(10, format!("mx.{domain}"))])
    }))
}

fn validator_with(
    policy: Policy,
    resolver: Arc<StubResolver>,
    prober: Arc<StubProbe>,
) -> Arc<Validator> {
    Arc::new(Validator::new(
        policy,
        fast_settings(),
        resolver,
        prober,
        Arc::new(NoDelay),
    ))
}

#[test]
fn malformed_address_never_touches_the_network() {
    let resolver = one_mx();
    let prober = Arc::new(StubProbe::always(250));
    let validator = validator_with(Policy::default(), resolver.clone(), prober.clone());

    let verdict = validator.validate_blocking("not-an-address");

    assert_eq!(verdict.kind, VerdictKind::Invalid);
    assert_eq!(verdict.reason, "invalid email format");
    assert_eq!(resolver.call_count(), 0);
    assert_eq!(prober.call_count(), 0);
}

#[test]
fn local_gates_run_in_order() {
    let mut policy = Policy::default();
    policy.blocklisted.insert("mailinator.com".to_string());
    let resolver = one_mx();
    let prober = Arc::new(StubProbe::always(250));
    let validator = validator_with(policy, resolver.clone(), prober.clone());

    // blocklist wins over disposable, disposable wins over role
    let blocked = validator.validate_blocking("admin@mailinator.com");
    assert_eq!(blocked.kind, VerdictKind::Blocklisted);
    assert_eq!(blocked.reason, "domain is blocklisted");

    let disposable = validator.validate_blocking("admin@yopmail.com");
    assert_eq!(disposable.kind, VerdictKind::Disposable);
    assert_eq!(disposable.reason, "disposable email address");

    assert_eq!(resolver.call_count(), 0);
}

#[test]
fn role_address_stops_before_mx_lookup() {
    let resolver = one_mx();
    let prober = Arc::new(StubProbe::always(250));
    let validator = validator_with(Policy::default(), resolver.clone(), prober.clone());

    let verdict = validator.validate_blocking("Admin+Billing@Example.com");

    assert_eq!(verdict.kind, VerdictKind::RoleBased);
    assert_eq!(verdict.reason, "role-based email address");
    assert_eq!(verdict.email, "admin+billing@example.com");
    assert!(verdict.mx_records.is_none());
    assert_eq!(resolver.call_count(), 0);
}

#[test]
fn nonexistent_domain_is_invalid() {
    let resolver = Arc::new(StubResolver::new(|domain| {
        Err(mx::Error::DomainNotFound {
            domain: domain.to_string(),
        })
    }));
    let prober = Arc::new(StubProbe::always(250));
    let validator = validator_with(Policy::empty(), resolver, prober.clone());

    let verdict = validator.validate_blocking("user@nonexistent-domain-xyz.invalid");

    assert_eq!(verdict.kind, VerdictKind::Invalid);
    assert!(verdict.reason.contains("does not exist"), "{}", verdict.reason);
    assert_eq!(prober.call_count(), 0);
}

#[test]
fn domain_without_mx_is_invalid() {
    let resolver = Arc::new(StubResolver::with_hosts(Vec::new()));
    let validator = validator_with(Policy::empty(), resolver, Arc::new(StubProbe::always(250)));

    let verdict = validator.validate_blocking("user@example.com");

    assert_eq!(verdict.kind, VerdictKind::Invalid);
    assert!(verdict.reason.contains("no MX records"));
}

#[test]
fn resolver_timeout_is_unknown() {
    let resolver = Arc::new(StubResolver::new(|domain| {
        Err(mx::Error::ResolutionTimeout {
            domain: domain.to_string(),
        })
    }));
    let validator = validator_with(Policy::empty(), resolver, Arc::new(StubProbe::always(250)));

    let verdict = validator.validate_blocking("user@slow.example");

    assert_eq!(verdict.kind, VerdictKind::Unknown);
    assert!(verdict.reason.contains("timeout"));
}

#[test]
fn skip_list_reports_mx_without_probing() {
    let mut policy = Policy::empty();
    policy.smtp_skip.insert("blocked-port.example".to_string());
    let prober = Arc::new(StubProbe::always(250));
    let validator = validator_with(policy, one_mx(), prober.clone());

    let verdict = validator.validate_blocking("user@blocked-port.example");

    assert_eq!(verdict.kind, VerdictKind::Unknown);
    assert_eq!(
        verdict.reason,
        "SMTP validation skipped for blocked-port.example (port 25 blocked by provider)"
    );
    assert_eq!(
        verdict.mx_records,
        Some(vec!["mx.blocked-port.example".to_string()])
    );
    assert_eq!(prober.call_count(), 0);
}

#[test]
fn unresponsive_servers_are_unknown() {
    let prober = Arc::new(StubProbe::new(|host, _| {
        Err(DialogError::Timeout {
            host: host.to_string(),
        })
    }));
    let validator = validator_with(Policy::empty(), one_mx(), prober);

    let verdict = validator.validate_blocking("user@example.com");

    assert_eq!(verdict.kind, VerdictKind::Unknown);
    assert!(verdict.reason.starts_with("all MX servers unresponsive: "));
    assert!(verdict.smtp_response.as_deref().is_some_and(|r| r.starts_with("0 ")));
}

#[test]
fn rejected_mailbox_skips_catch_all_check() {
    let prober = Arc::new(StubProbe::new(|host, _| {
        Ok(ProbeOutcome::answered(host, 550, "5.1.1 User unknown"))
    }));
    let validator = validator_with(Policy::empty(), one_mx(), prober.clone());

    let verdict = validator.validate_blocking("ghost@example.com");

    assert_eq!(verdict.kind, VerdictKind::UserNotFound);
    assert_eq!(verdict.reason, "mailbox does not exist");
    assert_eq!(verdict.smtp_response.as_deref(), Some("550 5.1.1 User unknown"));
    assert!(verdict.catch_all.is_none());
    assert_eq!(prober.call_count(), 1);
}

#[test]
fn accepting_everything_is_catch_all() {
    let prober = Arc::new(StubProbe::always(250));
    let validator = validator_with(Policy::empty(), one_mx(), prober.clone());

    let verdict = validator.validate_blocking("someone@catchall-demo.test");

    assert_eq!(verdict.kind, VerdictKind::CatchAll);
    assert_eq!(verdict.reason, "domain accepts all emails (catch-all)");
    let result = verdict.catch_all.expect("catch-all result attached");
    assert_eq!(result.probes_sent, 3);
    assert_eq!(prober.call_count(), 4);
}

#[test]
fn real_mailbox_on_strict_domain_is_valid() {
    let prober = Arc::new(StubProbe::new(|host, recipient| {
        if recipient == "alice@example.com" {
            Ok(ProbeOutcome::answered(host, 250, "2.1.5 Ok"))
        } else {
            Ok(ProbeOutcome::answered(host, 550, "5.1.1 no such user"))
        }
    }));
    let validator = validator_with(Policy::empty(), one_mx(), prober);

    let verdict = validator.validate_blocking("alice@example.com");

    assert_eq!(verdict.kind, VerdictKind::Valid);
    assert_eq!(verdict.reason, "mailbox verified via SMTP");
    assert_eq!(verdict.mx_records, Some(vec!["mx.example.com".to_string()]));
    assert_eq!(verdict.catch_all.map(|r| r.is_catch_all), Some(false));
}

#[test]
fn excluded_provider_is_not_probed_for_catch_all() {
    let prober = Arc::new(StubProbe::always(250));
    let validator = validator_with(Policy::default(), one_mx(), prober.clone());

    let verdict = validator.validate_blocking("alice@gmail.com");

    assert_eq!(verdict.kind, VerdictKind::Valid);
    assert_eq!(prober.call_count(), 1);
}

#[test]
fn expired_deadline_yields_unknown() {
    let prober = Arc::new(StubProbe::always(250));
    let validator = validator_with(Policy::empty(), one_mx(), prober.clone());

    let verdict =
        validator.validate_until("user@example.com", Instant::now() - Duration::from_millis(1));

    assert_eq!(verdict.kind, VerdictKind::Unknown);
    assert!(verdict.reason.contains("deadline exceeded"));
    assert_eq!(prober.call_count(), 0);
}

#[test]
fn catch_all_results_are_cached_per_domain() {
    let prober = Arc::new(StubProbe::always(250));
    let store = Arc::new(MemoryStore::new());
    let validator = Validator::new(
        Policy::empty(),
        fast_settings(),
        one_mx(),
        prober.clone(),
        Arc::new(NoDelay),
    )
    .with_catch_all_store(store);

    validator.validate_blocking("a@catchall-demo.test");
    validator.validate_blocking("b@catchall-demo.test");

    // 1 + 3 probes for the first address, 1 for the second
    assert_eq!(prober.call_count(), 5);
}

#[test]
fn catch_all_check_cut_by_the_deadline_is_not_stored() {
    let prober = Arc::new(StubProbe::new(|host, _| {
        std::thread::sleep(Duration::from_millis(80));
        Ok(ProbeOutcome::answered(host, 250, "2.1.5 Ok"))
    }));
    let store = Arc::new(MemoryStore::new());
    let validator = Validator::new(
        Policy::empty(),
        fast_settings(),
        one_mx(),
        prober.clone(),
        Arc::new(NoDelay),
    )
    .with_catch_all_store(store.clone());

    let first = validator.validate_until(
        "a@catchall-demo.test",
        Instant::now() + Duration::from_millis(40),
    );

    assert_eq!(first.kind, VerdictKind::Unknown);
    assert_eq!(first.reason, "catch-all detection cut short by the deadline");
    assert!(CatchAllStore::get(&*store, "catchall-demo.test").is_none());
    assert_eq!(prober.call_count(), 1);

    let second = validator.validate_blocking("b@catchall-demo.test");
    assert_eq!(second.kind, VerdictKind::CatchAll);
    assert_eq!(prober.call_count(), 5);
    assert!(CatchAllStore::get(&*store, "catchall-demo.test").is_some_and(|r| r.is_catch_all));
}

#[test]
fn standalone_catch_all_check() {
    let prober = Arc::new(StubProbe::always(250));
    let validator = validator_with(Policy::empty(), one_mx(), prober.clone());

    let result = validator
        .check_catch_all_domain("CatchAll-Demo.test")
        .expect("domain resolves");

    assert!(result.is_catch_all);
    assert_eq!(prober.call_count(), 3);
    let recipients: HashSet<String> = prober
        .calls
        .lock()
        .iter()
        .map(|(_, recipient)| recipient.clone())
        .collect();
    assert!(recipients.iter().all(|r| r.ends_with("@catchall-demo.test")));
}

#[test]
fn standalone_catch_all_check_propagates_mx_errors() {
    let resolver = Arc::new(StubResolver::new(|domain| {
        Err(mx::Error::DomainNotFound {
            domain: domain.to_string(),
        })
    }));
    let validator = validator_with(Policy::empty(), resolver, Arc::new(StubProbe::always(250)));

    let err = validator
        .check_catch_all_domain("gone.example")
        .expect_err("missing domain");
    assert!(err.is_domain_missing());
}

#[tokio::test]
async fn async_validation_matches_blocking() {
    let prober = Arc::new(StubProbe::new(|host, _| {
        Ok(ProbeOutcome::answered(host, 550, "mailbox unavailable"))
    }));
    let validator = validator_with(Policy::empty(), one_mx(), prober);

    let from_async = validator.validate("bob@example.com").await;
    let from_blocking = validator.validate_blocking("bob@example.com");

    assert_eq!(from_async, from_blocking);
    assert_eq!(from_async.kind, VerdictKind::UserNotFound);
}

#[tokio::test]
async fn async_local_gate_needs_no_blocking_task() {
    let resolver = one_mx();
    let validator = validator_with(Policy::default(), resolver.clone(), Arc::new(StubProbe::always(250)));

    let verdict = validator.validate("support@example.com").await;

    assert_eq!(verdict.kind, VerdictKind::RoleBased);
    assert_eq!(resolver.call_count(), 0);
}

#[derive(Default)]
struct CountingDelay {
    calls: AtomicUsize,
}

impl DelayStrategy for CountingDelay {
    fn next_delay(&self) -> Duration {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Duration::ZERO
    }
}

#[tokio::test]
async fn bulk_preserves_order_and_paces_domains() {
    let prober = Arc::new(StubProbe::new(|host, recipient| {
        let code = if recipient.starts_with("ok") { 250 } else { 550 };
        Ok(ProbeOutcome::answered(host, code, "scripted"))
    }));
    let mut policy = Policy::empty();
    policy.catch_all_excluded.insert("one.com".to_string());
    policy.catch_all_excluded.insert("two.com".to_string());
    let validator = validator_with(policy, one_mx(), prober);
    let delay = Arc::new(CountingDelay::default());
    let options = BulkOptions {
        max_concurrent_domains: 2,
        delay: delay.clone(),
        store: None,
    };
    let input: Vec<String> = ["ok1@one.com", "no1@two.com", "broken", "ok2@ONE.com", "no2@one.com"]
        .iter()
        .map(|email| email.to_string())
        .collect();

    let report = validate_bulk(&validator, input, &options).await;

    let emails: Vec<&str> = report.results.iter().map(|v| v.email.as_str()).collect();
    assert_eq!(
        emails,
        ["ok1@one.com", "no1@two.com", "broken", "ok2@one.com", "no2@one.com"]
    );
    assert_eq!(report.total, 5);
    assert_eq!(report.valid, 2);
    assert_eq!(report.not_valid, 3);
    assert_eq!(report.cached, 0);
    // three addresses for one.com, one for two.com, none for the bad input
    assert_eq!(delay.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn bulk_does_not_pause_after_locally_rejected_addresses() {
    let prober = Arc::new(StubProbe::always(250));
    let mut policy = Policy::empty();
    policy.role_prefixes.insert("admin".to_string());
    policy.catch_all_excluded.insert("one.com".to_string());
    let validator = validator_with(policy, one_mx(), prober.clone());
    let delay = Arc::new(CountingDelay::default());
    let options = BulkOptions {
        max_concurrent_domains: 1,
        delay: delay.clone(),
        store: None,
    };
    let input: Vec<String> = ["admin@one.com", "ok1@one.com", "ok2@one.com"]
        .iter()
        .map(|email| email.to_string())
        .collect();

    let report = validate_bulk(&validator, input, &options).await;

    assert_eq!(report.results[0].kind, VerdictKind::RoleBased);
    assert_eq!(prober.call_count(), 2);
    // only between ok1 and ok2
    assert_eq!(delay.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn bulk_reports_cache_hits() {
    let resolver = one_mx();
    let prober = Arc::new(StubProbe::always(550));
    let validator = validator_with(Policy::empty(), resolver.clone(), prober);
    let store = Arc::new(MemoryStore::new());
    let options = BulkOptions {
        max_concurrent_domains: 4,
        delay: Arc::new(NoDelay),
        store: Some(store),
    };
    let input = vec!["x@example.com".to_string(), "X@example.com".to_string()];

    let report = validate_bulk(&validator, input, &options).await;

    assert_eq!(report.cached, 1);
    assert_eq!(report.results.len(), 2);
    assert_eq!(resolver.call_count(), 1);
}
