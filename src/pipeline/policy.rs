use std::collections::HashSet;

use phf::phf_set;

use crate::validator::base_local_part;

const DISPOSABLE_DOMAINS: phf::Set<&'static str> = phf_set! {
    "tempmail.com",
    "throwaway.email",
    "guerrillamail.com",
    "10minutemail.com",
    "mailinator.com",
    "temp-mail.org",
    "fakeinbox.com",
    "getnada.com",
    "trashmail.com",
    "maildrop.cc",
    "yopmail.com",
    "mohmal.com",
};

const BLOCKLISTED_DOMAINS: phf::Set<&'static str> = phf_set! {
    "spam.com",
    "blocked.com",
    "malicious.com",
};

const ROLE_PREFIXES: phf::Set<&'static str> = phf_set! {
    "admin",
    "support",
    "help",
    "info",
    "noreply",
    "no-reply",
    "sales",
    "marketing",
    "contact",
    "service",
    "team",
    "hello",
    "mail",
    "postmaster",
    "webmaster",
    "abuse",
};

// Large providers answer 250 to everything at RCPT time but are not catch-all.
const CATCH_ALL_EXCLUDED: phf::Set<&'static str> = phf_set! {
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "outlook.com",
    "hotmail.com",
    "live.com",
    "icloud.com",
};

/// Read-only lists consulted by the local gates.
///
/// Every entry is stored lowercase. Domain lists match the whole domain;
/// role prefixes match the local part with any `+tag` removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub disposable: HashSet<String>,
    pub blocklisted: HashSet<String>,
    pub role_prefixes: HashSet<String>,
    /// Domains whose SMTP probe is skipped (port 25 blocked by the provider).
    pub smtp_skip: HashSet<String>,
    pub catch_all_excluded: HashSet<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            disposable: from_phf(&DISPOSABLE_DOMAINS),
            blocklisted: from_phf(&BLOCKLISTED_DOMAINS),
            role_prefixes: from_phf(&ROLE_PREFIXES),
            smtp_skip: HashSet::new(),
            catch_all_excluded: from_phf(&CATCH_ALL_EXCLUDED),
        }
    }
}

impl Policy {
    /// No list entries at all.
    pub fn empty() -> Self {
        Self {
            disposable: HashSet::new(),
            blocklisted: HashSet::new(),
            role_prefixes: HashSet::new(),
            smtp_skip: HashSet::new(),
            catch_all_excluded: HashSet::new(),
        }
    }

    pub fn is_blocklisted(&self, domain: &str) -> bool {
        self.blocklisted.contains(domain)
    }

    pub fn is_disposable(&self, domain: &str) -> bool {
        self.disposable.contains(domain)
    }

    pub fn is_role_based(&self, local: &str) -> bool {
        self.role_prefixes.contains(base_local_part(local))
    }

    pub fn skips_smtp(&self, domain: &str) -> bool {
        self.smtp_skip.contains(domain)
    }
}

fn from_phf(set: &phf::Set<&'static str>) -> HashSet<String> {
    set.iter().map(|entry| (*entry).to_string()).collect()
}

/// Lowercases and trims `entries`, dropping blanks.
pub(crate) fn normalized_set<I, S>(entries: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .map(|entry| entry.as_ref().trim().to_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Domain-list flavour of [`normalized_set`]: entries are also converted to
/// their ASCII (punycode) form, the form [`Address::domain`] returns. The
/// first entry that is not a domain name is returned as the error.
///
/// [`Address::domain`]: crate::validator::Address::domain
pub(crate) fn normalized_domains<I, S>(entries: I) -> Result<HashSet<String>, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut domains = HashSet::new();
    for entry in entries {
        let trimmed = entry.as_ref().trim().trim_end_matches('.');
        if trimmed.is_empty() {
            continue;
        }
        let ascii = idna::domain_to_ascii(trimmed).map_err(|_| trimmed.to_string())?;
        domains.insert(ascii.to_ascii_lowercase());
    }
    Ok(domains)
}
