//! Structure mirroring the TOML configuration file. Every field is optional;
//! missing values fall back to the runtime defaults.

use serde::Deserialize;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub(crate) sender: SenderSection,
    #[serde(default)]
    pub(crate) probe: ProbeSection,
    #[serde(default)]
    pub(crate) dns: DnsSection,
    #[serde(default)]
    pub(crate) catch_all: CatchAllSection,
    #[serde(default)]
    pub(crate) lists: ListsSection,
    #[serde(default)]
    pub(crate) bulk: BulkSection,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct SenderSection {
    pub(crate) mail_from: Option<String>,
    pub(crate) helo: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct ProbeSection {
    pub(crate) port: Option<u16>,
    pub(crate) max_hosts: Option<usize>,
    pub(crate) per_host_retries: Option<u32>,
    pub(crate) retry_delay_ms: Option<u64>,
    pub(crate) attempt_timeout_ms: Option<u64>,
    pub(crate) starttls: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct DnsSection {
    pub(crate) timeout_ms: Option<u64>,
    pub(crate) attempts: Option<usize>,
    pub(crate) nameservers: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct CatchAllSection {
    pub(crate) attempts_per_host: Option<u32>,
    pub(crate) threshold: Option<f64>,
    pub(crate) max_hosts: Option<usize>,
    pub(crate) delay_min_ms: Option<u64>,
    pub(crate) delay_max_ms: Option<u64>,
    pub(crate) attempt_timeout_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct ListsSection {
    pub(crate) disposable: Option<Vec<String>>,
    pub(crate) blocklisted: Option<Vec<String>>,
    pub(crate) role_prefixes: Option<Vec<String>>,
    pub(crate) smtp_skip: Option<Vec<String>>,
    pub(crate) catch_all_excluded: Option<Vec<String>>,
    /// Drop the built-in lists instead of extending them.
    pub(crate) replace_defaults: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct BulkSection {
    pub(crate) delay_min_ms: Option<u64>,
    pub(crate) delay_max_ms: Option<u64>,
    pub(crate) max_concurrent_domains: Option<usize>,
}
