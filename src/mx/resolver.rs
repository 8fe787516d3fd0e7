use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use trust_dns_resolver::Resolver;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;

use super::{Error, MxHost};

/// Source of raw MX answers. Implementations report NXDOMAIN, timeouts and
/// other failures through [`Error`]; an existing domain without MX records
/// yields `Ok(vec![])`.
pub trait LookupMx: Send + Sync {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxHost>, Error>;
}

/// Lookup MX records for `domain` using the system resolver.
///
/// The domain is normalized via IDNA before querying DNS. The resulting list
/// is sorted by ascending preference and never empty.
pub fn resolve_mx(domain: &str) -> Result<Vec<MxHost>, Error> {
    let ascii = normalize_domain(domain)?;
    resolve_with(&SystemResolver::default(), &ascii)
}

pub fn resolve_with<R>(resolver: &R, ascii_domain: &str) -> Result<Vec<MxHost>, Error>
where
    R: LookupMx + ?Sized,
{
    let mut records = resolver.lookup_mx(ascii_domain)?;

    // stable: equal preferences keep the order the resolver gave us
    records.sort_by_key(|record| record.preference);
    let mut seen = HashSet::new();
    records.retain(|record| seen.insert(record.clone()));

    if records.is_empty() {
        return Err(Error::NoMailExchanger {
            domain: ascii_domain.to_string(),
        });
    }
    tracing::debug!(domain = ascii_domain, count = records.len(), "resolved MX hosts");
    Ok(records)
}

/// Trims `domain` and converts it to its ASCII (punycode) form.
pub fn normalize_domain(domain: &str) -> Result<String, Error> {
    let trimmed = domain.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyDomain);
    }
    idna::domain_to_ascii(trimmed).map_err(Error::idna)
}

pub(crate) fn normalize_exchange(exchange: String) -> String {
    let trimmed = exchange.trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}

/// Blocking DNS resolver. A fresh `trust_dns_resolver::Resolver` is built for
/// every lookup so that no runtime outlives the calling thread.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    nameservers: Vec<IpAddr>,
    timeout: Duration,
    attempts: usize,
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self {
            nameservers: Vec::new(),
            timeout: Duration::from_secs(5),
            attempts: 2,
        }
    }
}

impl SystemResolver {
    /// Empty `nameservers` means "use the system configuration".
    pub fn new(nameservers: Vec<IpAddr>, timeout: Duration, attempts: usize) -> Self {
        Self {
            nameservers,
            timeout,
            attempts: attempts.max(1),
        }
    }

    fn build(&self) -> Result<Resolver, Error> {
        let (config, mut opts) = if self.nameservers.is_empty() {
            trust_dns_resolver::system_conf::read_system_conf().map_err(Error::resolver_init)?
        } else {
            let group = NameServerConfigGroup::from_ips_clear(&self.nameservers, 53, true);
            (
                ResolverConfig::from_parts(None, Vec::new(), group),
                ResolverOpts::default(),
            )
        };
        opts.timeout = self.timeout;
        opts.attempts = self.attempts;
        Resolver::new(config, opts).map_err(Error::resolver_init)
    }
}

impl LookupMx for SystemResolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxHost>, Error> {
        let resolver = self.build()?;
        match resolver.mx_lookup(domain) {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| MxHost::new(mx.preference(), normalize_exchange(mx.exchange().to_utf8())))
                .collect()),
            Err(err) => classify_resolve_error(domain, err),
        }
    }
}

fn classify_resolve_error(domain: &str, err: ResolveError) -> Result<Vec<MxHost>, Error> {
    if let ResolveErrorKind::NoRecordsFound { response_code, .. } = err.kind() {
        if *response_code == ResponseCode::NXDomain {
            return Err(Error::DomainNotFound {
                domain: domain.to_string(),
            });
        }
        return Ok(Vec::new());
    }
    if matches!(err.kind(), ResolveErrorKind::Timeout) {
        return Err(Error::ResolutionTimeout {
            domain: domain.to_string(),
        });
    }
    Err(Error::Lookup { source: err })
}
