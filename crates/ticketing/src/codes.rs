//! Access code generation
//!
//! Codes are the public token a purchaser redeems: `BW-` plus six characters
//! from an unambiguous uppercase alphanumeric alphabet (no `0`/`O`, `1`/`I`
//! — these get read over the phone and typed from emails).

use rand::Rng;

pub const CODE_PREFIX: &str = "BW-";

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

/// Collision retries before issuance fails with `CodeGenerationExhausted`.
/// At 32^6 codes a collision is astronomically unlikely; the bound exists so
/// a corrupted store can't spin issuance forever.
pub const MAX_GENERATION_ATTEMPTS: u32 = 5;

/// Generate a fresh access code. Uniqueness is checked against the store by
/// the issuance service, not here.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", CODE_PREFIX, suffix)
}

/// Normalize a user-supplied code for lookup (trim + uppercase).
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Whether a string is shaped like an access code we could have issued.
pub fn is_valid_code(code: &str) -> bool {
    let Some(suffix) = code.strip_prefix(CODE_PREFIX) else {
        return false;
    };
    suffix.len() == CODE_LENGTH && suffix.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_codes_match_format() {
        for _ in 0..100 {
            let code = generate_code();
            assert!(is_valid_code(&code), "bad code: {}", code);
        }
    }

    #[test]
    fn alphabet_excludes_ambiguous_characters() {
        for c in [b'0', b'O', b'1', b'I'] {
            assert!(!CODE_ALPHABET.contains(&c));
        }
    }

    #[test]
    fn thousand_codes_are_distinct() {
        let mut seen = HashSet::new();
        for _ in 0..1_000 {
            assert!(seen.insert(generate_code()), "duplicate code generated");
        }
    }

    #[test]
    fn normalize_uppercases_and_trims() {
        assert_eq!(normalize_code("  bw-abc234 "), "BW-ABC234");
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!(!is_valid_code("BW-ABC23"));
        assert!(!is_valid_code("XX-ABC234"));
        assert!(!is_valid_code("BW-ABC0IO"));
        assert!(!is_valid_code(""));
    }
}
