//! Checksummed random pseudonyms for diary participants.
//!
//! The digit block ends in a Verhoeff check digit, so a single mistyped
//! digit or a swapped adjacent pair is caught at registration time.

use anyhow::{bail, Result};
use rand::Rng;

const MIN_DIGITS: usize = 4;
// i64-safe and matches what registration forms accept
const MAX_DIGITS: usize = 15;

const D: [[u8; 10]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 2, 3, 4, 0, 6, 7, 8, 9, 5],
    [2, 3, 4, 0, 1, 7, 8, 9, 5, 6],
    [3, 4, 0, 1, 2, 8, 9, 5, 6, 7],
    [4, 0, 1, 2, 3, 9, 5, 6, 7, 8],
    [5, 9, 8, 7, 6, 0, 4, 3, 2, 1],
    [6, 5, 9, 8, 7, 1, 0, 4, 3, 2],
    [7, 6, 5, 9, 8, 2, 1, 0, 4, 3],
    [8, 7, 6, 5, 9, 3, 2, 1, 0, 4],
    [9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
];

const P: [[u8; 10]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 5, 7, 6, 2, 8, 3, 0, 9, 4],
    [5, 8, 0, 3, 7, 9, 6, 1, 4, 2],
    [8, 9, 1, 6, 0, 4, 3, 5, 2, 7],
    [9, 4, 5, 3, 1, 2, 6, 8, 7, 0],
    [4, 2, 8, 6, 5, 7, 3, 9, 0, 1],
    [2, 7, 9, 3, 8, 0, 6, 4, 1, 5],
    [7, 0, 4, 6, 9, 1, 3, 2, 5, 8],
];

const INV: [u8; 10] = [0, 4, 3, 2, 1, 5, 6, 7, 8, 9];

fn digits_reversed(digits: &str) -> Result<Vec<u8>> {
    digits
        .chars()
        .rev()
        .map(|c| {
            c.to_digit(10)
                .map(|d| d as u8)
                .ok_or_else(|| anyhow::anyhow!("'{digits}' contains a non-digit character"))
        })
        .collect()
}

/// Check digit to append to `digits`.
pub fn generate_checksum(digits: &str) -> Result<u8> {
    let reversed = digits_reversed(digits)?;
    let mut c = 0u8;
    for (i, &digit) in reversed.iter().enumerate() {
        c = D[c as usize][P[(i + 1) % 8][digit as usize] as usize];
    }
    Ok(INV[c as usize])
}

/// Whether the trailing digit of `digits` is the correct check digit for the
/// rest.
pub fn validate_checksum(digits: &str) -> bool {
    let Ok(reversed) = digits_reversed(digits) else {
        return false;
    };
    let mut c = 0u8;
    for (i, &digit) in reversed.iter().enumerate() {
        c = D[c as usize][P[i % 8][digit as usize] as usize];
    }
    c == 0
}

/// Random pseudonym `PREFIX<separator><digits>` where the digit block has
/// `digits` digits ending in the check digit. Trailing whitespace, dashes and
/// underscores of the prefix are dropped before the separator is applied.
pub fn generate_random_pseudonym(prefix: &str, digits: usize, separator: &str) -> Result<String> {
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
        bail!("pseudonym digit count {digits} out of range {MIN_DIGITS}..={MAX_DIGITS}");
    }

    let prefix = prefix.trim_end_matches(|c: char| c.is_whitespace() || c == '-' || c == '_');

    let mut rng = rand::rng();
    let mut body = String::with_capacity(digits);
    for _ in 0..digits - 1 {
        body.push(char::from(b'0' + rng.random_range(0..10u8)));
    }
    let check = generate_checksum(&body)?;
    body.push(char::from(b'0' + check));

    Ok(format!("{prefix}{separator}{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_known_checksum() {
        assert_eq!(generate_checksum("12345678").unwrap(), 4);
    }

    #[test]
    fn validates_known_checksums() {
        for valid in ["21735388", "42310887", "92797577", "48892501", "84905866", "64567623", "00076238"] {
            assert!(validate_checksum(valid), "{valid} should validate");
        }
        assert!(!validate_checksum("21735389"));
        assert!(!validate_checksum("42310888"));
        assert!(!validate_checksum("4231x888"));
    }

    #[test]
    fn generated_pseudonyms_carry_valid_checksums() {
        for digits in MIN_DIGITS..=MAX_DIGITS {
            for _ in 0..100 {
                let pseudonym = generate_random_pseudonym("TEST", digits, "-").unwrap();
                let block = pseudonym.strip_prefix("TEST-").unwrap();
                assert_eq!(block.len(), digits);
                assert!(validate_checksum(block), "{pseudonym} failed validation");
            }
        }
    }

    #[test]
    fn trims_trailing_separator_noise_from_prefix() {
        for prefix in ["TEST", "TEST ", "TEST-", "TEST---", "TEST_", "TEST___"] {
            let pseudonym = generate_random_pseudonym(prefix, 8, "-").unwrap();
            assert!(pseudonym.starts_with("TEST-"), "got {pseudonym}");
            assert!(!pseudonym.starts_with("TEST--"));
        }
    }

    #[test]
    fn honors_custom_separator() {
        let pseudonym = generate_random_pseudonym("TEST-", 8, "#").unwrap();
        assert!(pseudonym.starts_with("TEST#"));
    }

    #[test]
    fn rejects_digit_counts_out_of_range() {
        assert!(generate_random_pseudonym("TEST", 3, "-").is_err());
        assert!(generate_random_pseudonym("TEST", 16, "-").is_err());
    }
}
