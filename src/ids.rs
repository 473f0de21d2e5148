use rand::{thread_rng, Rng};

/// Base58: alphanumerics without the easily confused `0`, `O`, `I` and `l`.
const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

pub const RANDOM_ID_LEN: usize = 8;

/// Draw a fresh paste identifier from the thread-local CSPRNG.
pub fn generate_random_id() -> String {
    let mut rng = thread_rng();
    (0..RANDOM_ID_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ids_use_the_alphabet() {
        let id = generate_random_id();
        assert_eq!(id.len(), RANDOM_ID_LEN);
        assert!(id.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn ids_do_not_collide() {
        let ids: HashSet<String> = (0..10_000).map(|_| generate_random_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }
}
