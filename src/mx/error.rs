use thiserror::Error;

#[derive(Debug, Error)]
pub enum MxError {
    #[error("domain is empty")]
    EmptyDomain,
    #[error("domain IDNA conversion failed")]
    IdnaConversion {
        #[source]
        source: idna::Errors,
    },
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: std::io::Error,
    },
    #[error("domain does not exist: {domain}")]
    DomainNotFound { domain: String },
    #[error("no MX records found for domain {domain}")]
    NoMailExchanger { domain: String },
    #[error("DNS lookup timeout for {domain}")]
    ResolutionTimeout { domain: String },
    #[error("DNS lookup failed: {source}")]
    Lookup {
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
}

impl MxError {
    pub(crate) fn idna(source: idna::Errors) -> Self {
        Self::IdnaConversion { source }
    }

    pub(crate) fn resolver_init(source: std::io::Error) -> Self {
        Self::ResolverInit { source }
    }

    /// True when the domain can never receive mail as resolved: it does not
    /// exist, or it exists without any exchanger.
    pub fn is_domain_missing(&self) -> bool {
        matches!(
            self,
            Self::DomainNotFound { .. } | Self::NoMailExchanger { .. } | Self::EmptyDomain
        )
    }
}
