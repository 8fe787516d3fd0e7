const ATEXT_SPECIALS: &str = "!#$%&'*+-/=?^_`{|}~";

/// Strict rules: ASCII atext plus '.', never leading, trailing or doubled.
pub(crate) fn is_local_strict(s: &str) -> bool {
    if s.starts_with('.') || s.ends_with('.') || s.contains("..") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || ATEXT_SPECIALS.contains(c))
}

/// Relaxed rules: a simple quoted-string is accepted, anything else falls
/// back to `is_local_strict`.
pub(crate) fn is_local_relaxed(s: &str) -> bool {
    if s.starts_with('"') && s.ends_with('"') && s.len() >= 2 {
        true
    } else {
        is_local_strict(s)
    }
}

/// Local part without its `+tag` sub-address.
pub fn base_local_part(local: &str) -> &str {
    match local.split_once('+') {
        Some((base, _)) if !base.is_empty() => base,
        _ => local,
    }
}
