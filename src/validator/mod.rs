//! Local format check. Runs before anything touches the network.

mod domain;
mod local;
mod types;

pub use types::{Address, FormatError, NormalizedEmail, ValidationMode, ValidationReport};

use domain::{check_domain, to_ascii_domain};
pub use local::base_local_part;
use local::{is_local_relaxed, is_local_strict};

pub fn validate_email(email: &str, mode: ValidationMode) -> ValidationReport {
    let input = email.trim();

    let mut reasons = Vec::new();

    if input.len() > 254 {
        reasons.push(format!("total length {} > 254", input.len()));
    }

    let parts: Vec<&str> = input.split('@').collect();
    if parts.len() != 2 {
        reasons.push("must contain exactly one '@'".to_string());
        return ValidationReport { ok: false, reasons };
    }
    let (local, domain) = (parts[0], parts[1]);

    if local.is_empty() || local.len() > 64 {
        reasons.push(format!(
            "local part length {} invalid (1..=64)",
            local.len()
        ));
    }

    check_domain(domain, &mut reasons);

    let local_ok = match mode {
        ValidationMode::Strict => is_local_strict(local),
        ValidationMode::Relaxed => is_local_relaxed(local),
    };
    if !local_ok {
        reasons.push(match mode {
            ValidationMode::Strict => "invalid local part (strict rules)".into(),
            ValidationMode::Relaxed => "invalid local part (relaxed rules)".into(),
        });
    }

    let ok = reasons.is_empty();
    ValidationReport { ok, reasons }
}

/// Validates `email` and returns the lowercased parts along with the ASCII
/// form of the domain. Parts are filled in even when the address is invalid.
pub fn normalize_email(email: &str, mode: ValidationMode) -> NormalizedEmail {
    let input = email.trim().to_lowercase();
    let (local, domain) = input.split_once('@').unwrap_or((input.as_str(), ""));

    let ValidationReport { ok, reasons } = validate_email(&input, mode);
    let ascii_domain = to_ascii_domain(domain).unwrap_or_default();

    NormalizedEmail {
        original: email.to_string(),
        local: local.to_string(),
        domain: domain.to_string(),
        ascii_domain,
        mode,
        valid: ok,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_basic() {
        let r = validate_email("alice@example.com", ValidationMode::Strict);
        assert!(r.ok, "{:?}", r.reasons);
    }

    #[test]
    fn rejects_double_at() {
        let r = validate_email("a@@b.com", ValidationMode::Strict);
        assert!(!r.ok);
    }

    #[test]
    fn rejects_numeric_tld() {
        let r = validate_email("bob@example.123", ValidationMode::Strict);
        assert!(!r.ok);
        assert!(r.reasons.iter().any(|r| r.contains("top-level")));
    }

    #[test]
    fn normalized_is_lowercase() {
        let n = normalize_email("  Alice.Smith@Example.COM ", ValidationMode::Strict);
        assert!(n.valid, "{:?}", n.reasons);
        assert_eq!(n.local, "alice.smith");
        assert_eq!(n.domain, "example.com");
        assert_eq!(n.ascii_domain, "example.com");
    }

    #[test]
    fn normalized_has_ascii_domain() {
        let n = normalize_email("alice@exämple.com", ValidationMode::Strict);
        assert_eq!(n.ascii_domain, "xn--exmple-cua.com");
    }

    #[test]
    fn address_parse_rejects_garbage() {
        let err = Address::parse("not-an-address").expect_err("must fail");
        assert!(!err.reasons.is_empty());
        assert!(err.to_string().starts_with("invalid email format"));
    }

    #[test]
    fn address_parse_keeps_parts() {
        let addr = Address::parse("John+News@Example.org").expect("valid");
        assert_eq!(addr.local(), "john+news");
        assert_eq!(addr.domain(), "example.org");
        assert_eq!(addr.to_string(), "john+news@example.org");
    }
}
