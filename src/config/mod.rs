//! Runtime configuration.
//!
//! [`Config`] starts from the built-in defaults and is overlaid by a TOML
//! [`ConfigFile`]. Values are checked once, when the file is applied; the
//! result is read-only afterwards.

mod file;

pub use file::ConfigFile;

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use crate::catchall::CatchAllOptions;
use crate::delay::RandomDelay;
use crate::mx::SystemResolver;
use crate::pipeline::{
    BulkOptions, Policy, Settings, Validator, normalized_domains, normalized_set,
};
use crate::smtp_verify::{DialogOptions, RetryPolicy, SenderIdentity, SmtpDialog};

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
        .expect("hostname pattern failed to compile")
});

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {source}")]
    Parse {
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsSettings {
    /// Empty means the system resolver configuration.
    pub nameservers: Vec<IpAddr>,
    pub timeout: Duration,
    pub attempts: usize,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            nameservers: Vec::new(),
            timeout: Duration::from_secs(5),
            attempts: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkSettings {
    pub delay: RandomDelay,
    pub max_concurrent_domains: usize,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            delay: RandomDelay::from_millis(300, 1_000),
            max_concurrent_domains: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub sender: SenderIdentity,
    pub dialog: DialogOptions,
    pub retry: RetryPolicy,
    pub dns: DnsSettings,
    pub catch_all: CatchAllOptions,
    pub catch_all_delay: RandomDelay,
    pub policy: Policy,
    pub bulk: BulkSettings,
    pub loaded_from: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sender: SenderIdentity::default(),
            dialog: DialogOptions::default(),
            retry: RetryPolicy::default(),
            dns: DnsSettings::default(),
            catch_all: CatchAllOptions::default(),
            catch_all_delay: RandomDelay::from_millis(200, 1_000),
            policy: Policy::default(),
            bulk: BulkSettings::default(),
            loaded_from: None,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        config.loaded_from = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(raw).map_err(|source| ConfigError::Parse { source })?;
        Self::from_file(file)
    }

    /// Overlays `file` on the defaults and validates the result.
    pub fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(mail_from) = file.sender.mail_from {
            config.sender.mail_from = mail_from.trim().to_string();
        }
        if let Some(helo) = file.sender.helo {
            config.sender.helo = helo.trim().to_string();
        }

        let probe = file.probe;
        if let Some(port) = probe.port {
            config.dialog.port = port;
        }
        if let Some(starttls) = probe.starttls {
            config.dialog.starttls = starttls;
        }
        if let Some(max_hosts) = probe.max_hosts {
            config.retry.max_hosts = max_hosts;
        }
        if let Some(retries) = probe.per_host_retries {
            config.retry.per_host_retries = retries;
        }
        if let Some(ms) = probe.retry_delay_ms {
            config.retry.retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = probe.attempt_timeout_ms {
            config.retry.attempt_timeout = Duration::from_millis(ms);
        }

        let dns = file.dns;
        if let Some(ms) = dns.timeout_ms {
            config.dns.timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = dns.attempts {
            config.dns.attempts = attempts;
        }
        if let Some(servers) = dns.nameservers {
            config.dns.nameservers = servers
                .iter()
                .map(|server| {
                    server.trim().parse::<IpAddr>().map_err(|_| {
                        ConfigError::invalid("dns.nameservers", format!("{server:?} is not an IP address"))
                    })
                })
                .collect::<Result<_, _>>()?;
        }

        let catch_all = file.catch_all;
        if let Some(attempts) = catch_all.attempts_per_host {
            config.catch_all.attempts_per_host = attempts;
        }
        if let Some(threshold) = catch_all.threshold {
            config.catch_all.threshold = threshold;
        }
        if let Some(max_hosts) = catch_all.max_hosts {
            config.catch_all.max_hosts = max_hosts;
        }
        if let Some(ms) = catch_all.attempt_timeout_ms {
            config.catch_all.policy.attempt_timeout = Duration::from_millis(ms);
        }
        config.catch_all_delay = delay_window(
            "catch_all.delay_min_ms",
            catch_all.delay_min_ms.unwrap_or(200),
            catch_all.delay_max_ms.unwrap_or(1_000),
        )?;

        let bulk = file.bulk;
        if let Some(max) = bulk.max_concurrent_domains {
            config.bulk.max_concurrent_domains = max;
        }
        config.bulk.delay = delay_window(
            "bulk.delay_min_ms",
            bulk.delay_min_ms.unwrap_or(300),
            bulk.delay_max_ms.unwrap_or(1_000),
        )?;

        let lists = file.lists;
        if lists.replace_defaults.unwrap_or(false) {
            config.policy = Policy::empty();
        }
        let policy = &mut config.policy;
        if let Some(extra) = lists.role_prefixes {
            policy.role_prefixes.extend(normalized_set(extra));
        }
        for (field, target, extra) in [
            ("lists.disposable", &mut policy.disposable, lists.disposable),
            ("lists.blocklisted", &mut policy.blocklisted, lists.blocklisted),
            ("lists.smtp_skip", &mut policy.smtp_skip, lists.smtp_skip),
            (
                "lists.catch_all_excluded",
                &mut policy.catch_all_excluded,
                lists.catch_all_excluded,
            ),
        ] {
            if let Some(extra) = extra {
                let domains = normalized_domains(extra).map_err(|entry| {
                    ConfigError::invalid(field, format!("{entry:?} is not a domain name"))
                })?;
                target.extend(domains);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sender.mail_from.is_empty() {
            return Err(ConfigError::invalid("sender.mail_from", "must not be empty"));
        }
        if !self.sender.mail_from.contains('@') {
            return Err(ConfigError::invalid(
                "sender.mail_from",
                format!("{:?} is not an address", self.sender.mail_from),
            ));
        }
        if !HOSTNAME.is_match(&self.sender.helo) {
            return Err(ConfigError::invalid(
                "sender.helo",
                format!("{:?} is not a host name", self.sender.helo),
            ));
        }
        if self.retry.per_host_retries < 1 {
            return Err(ConfigError::invalid("probe.per_host_retries", "must be at least 1"));
        }
        if self.retry.max_hosts < 1 {
            return Err(ConfigError::invalid("probe.max_hosts", "must be at least 1"));
        }
        if self.retry.attempt_timeout.is_zero() {
            return Err(ConfigError::invalid("probe.attempt_timeout_ms", "must be positive"));
        }
        if self.catch_all.policy.attempt_timeout.is_zero() {
            return Err(ConfigError::invalid("catch_all.attempt_timeout_ms", "must be positive"));
        }
        if self.dns.attempts < 1 {
            return Err(ConfigError::invalid("dns.attempts", "must be at least 1"));
        }
        let threshold = self.catch_all.threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "catch_all.threshold",
                format!("{threshold} is outside (0, 1]"),
            ));
        }
        if self.catch_all.attempts_per_host < 1 {
            return Err(ConfigError::invalid("catch_all.attempts_per_host", "must be at least 1"));
        }
        if self.catch_all.max_hosts < 1 {
            return Err(ConfigError::invalid("catch_all.max_hosts", "must be at least 1"));
        }
        if self.bulk.max_concurrent_domains < 1 {
            return Err(ConfigError::invalid("bulk.max_concurrent_domains", "must be at least 1"));
        }
        Ok(())
    }

    pub fn resolver(&self) -> SystemResolver {
        SystemResolver::new(self.dns.nameservers.clone(), self.dns.timeout, self.dns.attempts)
    }

    /// Validator wired to the real DNS resolver and SMTP dialog.
    pub fn validator(&self) -> Validator {
        Validator::new(
            self.policy.clone(),
            Settings {
                retry: self.retry.clone(),
                catch_all: self.catch_all.clone(),
            },
            Arc::new(self.resolver()),
            Arc::new(SmtpDialog::new(self.sender.clone(), self.dialog.clone())),
            Arc::new(self.catch_all_delay),
        )
    }

    pub fn bulk_options(&self) -> BulkOptions {
        BulkOptions {
            max_concurrent_domains: self.bulk.max_concurrent_domains,
            delay: Arc::new(self.bulk.delay),
            store: None,
        }
    }
}

fn delay_window(field: &'static str, min_ms: u64, max_ms: u64) -> Result<RandomDelay, ConfigError> {
    if min_ms > max_ms {
        return Err(ConfigError::invalid(
            field,
            format!("minimum {min_ms} ms exceeds maximum {max_ms} ms"),
        ));
    }
    Ok(RandomDelay::from_millis(min_ms, max_ms))
}
