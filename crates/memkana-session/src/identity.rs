//! Random opaque identifiers: guest names and timer ids.
//!
//! Ids are drawn from the 62-character alphanumeric alphabet using the
//! thread-local generator from `rand::rng()`. Every worker thread gets
//! its own OS-seeded instance, so concurrent connection tasks can mint
//! ids without contending on a shared lock.
//!
//! Collisions are possible and are not checked.

use memkana_protocol::PlayerName;
use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of the random suffix in a guest name.
pub const GUEST_SUFFIX_LEN: usize = 8;

/// Prefix shared by every generated player name.
pub const GUEST_PREFIX: &str = "guest-";

/// Returns `length` characters drawn uniformly, with replacement, from
/// `[a-zA-Z0-9]`.
pub fn random_id(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generates a fresh guest identity such as `guest-Q3xk9LmA`.
pub fn guest_name() -> PlayerName {
    PlayerName(format!("{GUEST_PREFIX}{}", random_id(GUEST_SUFFIX_LEN)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_id_has_requested_length() {
        assert_eq!(random_id(0), "");
        assert_eq!(random_id(8).len(), 8);
        assert_eq!(random_id(64).len(), 64);
    }

    #[test]
    fn test_random_id_is_alphanumeric() {
        let id = random_id(512);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()), "{id}");
    }

    #[test]
    fn test_random_id_covers_the_alphabet() {
        // 20k draws over 62 symbols: every class shows up.
        let id = random_id(20_000);
        assert!(id.chars().any(|c| c.is_ascii_lowercase()));
        assert!(id.chars().any(|c| c.is_ascii_uppercase()));
        assert!(id.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_guest_name_format() {
        let name = guest_name();
        let suffix = name
            .as_str()
            .strip_prefix(GUEST_PREFIX)
            .expect("guest prefix");
        assert_eq!(suffix.len(), GUEST_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_guest_names_from_many_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| guest_name()).collect::<Vec<_>>()))
            .collect();
        let names: Vec<PlayerName> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread should not panic"))
            .collect();
        assert_eq!(names.len(), 800);
        assert!(names.iter().all(|n| n.as_str().len() == 14));
    }
}
