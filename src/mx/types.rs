use std::fmt;

/// A mail exchanger for a domain. Lower `preference` is tried first.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MxHost {
    pub preference: u16,
    pub exchange: String,
}

impl MxHost {
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

impl fmt::Display for MxHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.preference, self.exchange)
    }
}

pub fn exchanges(hosts: &[MxHost]) -> Vec<String> {
    hosts.iter().map(|host| host.exchange.clone()).collect()
}
