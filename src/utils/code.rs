// src/utils/code.rs

use rand::Rng;

use crate::config::COMPETITION_CODE_LENGTH;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Normalizes user input into a competition code.
///
/// Keeps only ASCII alphanumeric characters, uppercases them, and truncates
/// the result to [`COMPETITION_CODE_LENGTH`] characters. Cleaning happens
/// before truncation, so `"ab#12!3x"` becomes `"AB123X"`.
pub fn normalize_code(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .take(COMPETITION_CODE_LENGTH)
        .collect()
}

/// A normalized code is only usable for joining once it is exactly full length.
pub fn is_complete_code(code: &str) -> bool {
    code.len() == COMPETITION_CODE_LENGTH
        && code
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
}

/// Generates a random uppercase alphanumeric competition code.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..COMPETITION_CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
