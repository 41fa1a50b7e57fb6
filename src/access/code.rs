//! Access-code text helpers: generation, normalization, and redaction.

use once_cell::sync::Lazy;
use rand::{rngs::OsRng, Rng};
use regex::Regex;

/// Uppercase alphabet without look-alike characters (`0/O`, `1/I`).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 12;
const REDACTED_PREFIX_LEN: usize = 4;

static CODE_FORMAT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Z0-9]{3,32}$").ok());

/// Produce a new random code from the OS random source.
#[must_use]
pub fn generate_code() -> String {
    (0..CODE_LENGTH)
        .map(|_| char::from(CODE_ALPHABET[OsRng.gen_range(0..CODE_ALPHABET.len())]))
        .collect()
}

/// Codes are case-insensitive and tolerate surrounding whitespace.
#[must_use]
pub fn normalize_code(submitted: &str) -> String {
    submitted.trim().to_uppercase()
}

/// Shape check on already-normalized input, done before any store round trip.
#[must_use]
pub fn valid_code_format(normalized: &str) -> bool {
    CODE_FORMAT
        .as_ref()
        .is_some_and(|regex| regex.is_match(normalized))
}

/// Prefix safe to put in audit details; the full code is never logged.
#[must_use]
pub fn redact_code(normalized: &str) -> String {
    let prefix: String = normalized.chars().take(REDACTED_PREFIX_LEN).collect();
    format!("{prefix}***")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_use_the_alphabet() {
        for _ in 0..64 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
            assert!(valid_code_format(&code));
        }
    }

    #[test]
    fn generated_codes_differ() {
        assert_ne!(generate_code(), generate_code());
    }

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize_code("  abcd23ef \n"), "ABCD23EF");
        assert_eq!(normalize_code("ABCD23EF"), "ABCD23EF");
    }

    #[test]
    fn format_rejects_garbage() {
        assert!(valid_code_format("TEST123"));
        assert!(!valid_code_format(""));
        assert!(!valid_code_format("AB"));
        assert!(!valid_code_format("ABC DEF"));
        assert!(!valid_code_format("ABC';--"));
        assert!(!valid_code_format(&"A".repeat(33)));
    }

    #[test]
    fn redaction_keeps_only_a_prefix() {
        assert_eq!(redact_code("ABCDEFGHJKLM"), "ABCD***");
        assert_eq!(redact_code("AB"), "AB***");
    }
}
