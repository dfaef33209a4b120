//! Scoped-alphabet random string generation
//!
//! Block identifiers and similar tokens are drawn from a cryptographically
//! secure source, one uniformly distributed character index at a time. The
//! generator has no state of its own; tests inject a seeded rng through
//! [`generate_with`].

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};

use crate::protocol::ID_HEX_LEN;

const DIGITS: &str = "0123456789";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const HEX: &str = "0123456789abcdef";

/// Character classes a random string may be drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alphabet {
    /// `0-9`
    Digits,
    /// `a-z`
    Lowercase,
    /// `A-Z`
    Uppercase,
    /// `0-9a-f`
    Hex,
    /// `0-9a-z`
    DigitsLower,
    /// `0-9A-Z`
    DigitsUpper,
    /// `0-9a-zA-Z`
    Alphanumeric,
}

impl Alphabet {
    /// The characters this alphabet draws from
    #[must_use]
    pub fn chars(self) -> String {
        match self {
            Self::Digits => DIGITS.to_owned(),
            Self::Lowercase => LOWERCASE.to_owned(),
            Self::Uppercase => UPPERCASE.to_owned(),
            Self::Hex => HEX.to_owned(),
            Self::DigitsLower => format!("{DIGITS}{LOWERCASE}"),
            Self::DigitsUpper => format!("{DIGITS}{UPPERCASE}"),
            Self::Alphanumeric => format!("{DIGITS}{LOWERCASE}{UPPERCASE}"),
        }
    }
}

/// Generate a random string from the given alphabet using the OS source
#[must_use]
pub fn generate(alphabet: Alphabet, len: usize) -> String {
    generate_with(&mut OsRng, alphabet, len)
}

/// Generate a random string from the given alphabet using the supplied rng
///
/// Each character costs one uniform `gen_range` draw, so no alphabet size
/// introduces modulo bias.
pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R, alphabet: Alphabet, len: usize) -> String {
    let table: Vec<char> = alphabet.chars().chars().collect();
    (0..len).map(|_| table[rng.gen_range(0..table.len())]).collect()
}

/// Generate a fresh block identifier: 64 lowercase hex characters
#[must_use]
pub fn block_id() -> String {
    generate(Alphabet::Hex, ID_HEX_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_block_id_shape() {
        for _ in 0..32 {
            let id = block_id();
            assert_eq!(id.len(), 64);
            assert!(id.chars().all(|c| HEX.contains(c)));
            assert_eq!(hex::decode(&id).unwrap().len(), 32);
        }
    }

    #[test]
    fn test_strings_stay_inside_their_alphabet() {
        let cases = [
            Alphabet::Digits,
            Alphabet::Lowercase,
            Alphabet::Uppercase,
            Alphabet::Hex,
            Alphabet::DigitsLower,
            Alphabet::DigitsUpper,
            Alphabet::Alphanumeric,
        ];
        for alphabet in cases {
            let allowed = alphabet.chars();
            let s = generate(alphabet, 128);
            assert_eq!(s.len(), 128);
            assert!(s.chars().all(|c| allowed.contains(c)), "{alphabet:?}: {s}");
        }
    }

    #[test]
    fn test_zero_length_is_empty() {
        assert_eq!(generate(Alphabet::Digits, 0), "");
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let a = generate_with(&mut StdRng::seed_from_u64(7), Alphabet::Alphanumeric, 40);
        let b = generate_with(&mut StdRng::seed_from_u64(7), Alphabet::Alphanumeric, 40);
        let c = generate_with(&mut StdRng::seed_from_u64(8), Alphabet::Alphanumeric, 40);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_every_alphabet_character_is_reachable() {
        // 4 bits of alphabet over 4096 draws: a missing character would mean
        // the draw is not close to uniform.
        let s = generate_with(&mut StdRng::seed_from_u64(42), Alphabet::Hex, 4096);
        for c in HEX.chars() {
            assert!(s.contains(c), "character {c} never drawn");
        }
    }
}
