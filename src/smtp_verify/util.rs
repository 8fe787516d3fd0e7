use rand::Rng;

const LOCAL_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Random lowercase alphanumeric local part, practically certain not to name
/// a real mailbox.
pub fn random_local_part(len: usize) -> String {
    let length = len.clamp(8, 32);
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| LOCAL_ALPHABET[rng.gen_range(0..LOCAL_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::Address;

    #[test]
    fn random_local_parts_are_valid_and_distinct() {
        let a = random_local_part(20);
        let b = random_local_part(20);
        assert_eq!(a.len(), 20);
        assert_ne!(a, b);
        assert!(Address::parse(&format!("{a}@example.com")).is_ok());
    }

    #[test]
    fn length_is_clamped() {
        assert_eq!(random_local_part(1).len(), 8);
        assert_eq!(random_local_part(500).len(), 32);
    }
}
