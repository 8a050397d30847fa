//! Password generation for credential rotation.

use rand::Rng;
use rand::seq::SliceRandom;

pub const DEFAULT_LENGTH: usize = 32;
pub const MIN_LENGTH: usize = 16;

const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const DIGITS: &[u8] = b"23456789";
// Shell- and URL-safe so the password survives WP-CLI arguments and DeployHQ payloads.
const SYMBOLS: &[u8] = b"-_.~!";

/// Generate a random password of at least [`MIN_LENGTH`] characters
/// containing at least one lowercase letter, uppercase letter, digit and
/// symbol.
pub fn generate_password(length: usize) -> String {
    let length = length.max(MIN_LENGTH);
    let mut rng = rand::thread_rng();
    let classes = [LOWER, UPPER, DIGITS, SYMBOLS];
    let all: Vec<u8> = classes.concat();

    let mut bytes: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    bytes.extend((classes.len()..length).map(|_| all[rng.gen_range(0..all.len())]));
    bytes.shuffle(&mut rng);

    bytes.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length_and_minimum() {
        assert_eq!(generate_password(DEFAULT_LENGTH).len(), 32);
        assert_eq!(generate_password(4).len(), MIN_LENGTH);
    }

    #[test]
    fn test_password_contains_every_class() {
        for _ in 0..50 {
            let password = generate_password(MIN_LENGTH);
            let bytes = password.as_bytes();
            assert!(bytes.iter().any(|b| LOWER.contains(b)));
            assert!(bytes.iter().any(|b| UPPER.contains(b)));
            assert!(bytes.iter().any(|b| DIGITS.contains(b)));
            assert!(bytes.iter().any(|b| SYMBOLS.contains(b)));
        }
    }

    #[test]
    fn test_passwords_differ() {
        assert_ne!(generate_password(DEFAULT_LENGTH), generate_password(DEFAULT_LENGTH));
    }
}
