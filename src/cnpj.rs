// 🏢 CNPJ - Brazilian company registry number
//
// 14 digits: 8 root + 4 branch + 2 check digits.
// Display mask: NN.NNN.NNN/NNNN-NN
//
// Everything here is pure: no allocation beyond the returned strings,
// no errors, no panics on partial or garbage input.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of digits in a complete CNPJ
pub const CNPJ_LENGTH: usize = 14;

/// Weights for the first check digit (aligned with digits 0..12)
const FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Weights for the second check digit (aligned with digits 0..13)
const SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

// ============================================================================
// CLEANING
// ============================================================================

/// Keep only ASCII digits ("11.444.777/0001-61" → "11444777000161")
pub fn strip(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn digits_of(cleaned: &str) -> Vec<u32> {
    cleaned.chars().filter_map(|c| c.to_digit(10)).collect()
}

// ============================================================================
// CHECK DIGITS
// ============================================================================

/// Weighted sum mod 11 → check digit (0 when remainder < 2)
fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits
        .iter()
        .zip(weights.iter())
        .map(|(digit, weight)| digit * weight)
        .sum();

    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

/// Compute both check digits for a 12-digit base
///
/// Returns None unless the cleaned input has exactly 12 digits.
///
/// Example: "114447770001" → Some((6, 1))
pub fn check_digits(base: &str) -> Option<(u32, u32)> {
    let mut digits = digits_of(&strip(base));
    if digits.len() != 12 {
        return None;
    }

    let first = check_digit(&digits, &FIRST_WEIGHTS);
    digits.push(first);
    let second = check_digit(&digits, &SECOND_WEIGHTS);

    Some((first, second))
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Validate a CNPJ (punctuation allowed, stripped first)
///
/// Fails on:
/// - length ≠ 14 after stripping
/// - 14 identical digits (degenerate numbers are never valid)
/// - either check digit mismatch
pub fn validate(input: &str) -> bool {
    let digits = digits_of(&strip(input));

    if digits.len() != CNPJ_LENGTH {
        return false;
    }

    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let first = check_digit(&digits[..12], &FIRST_WEIGHTS);
    if first != digits[12] {
        return false;
    }

    let second = check_digit(&digits[..13], &SECOND_WEIGHTS);
    second == digits[13]
}

/// Three-state check for input that is still being typed
///
/// - None: fewer than 14 digits so far (incomplete, no verdict yet)
/// - Some(valid): 14 or more digits present
pub fn check(input: &str) -> Option<bool> {
    if strip(input).len() < CNPJ_LENGTH {
        None
    } else {
        Some(validate(input))
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Apply the NN.NNN.NNN/NNNN-NN mask progressively
///
/// Separators are only inserted once the digit that follows them exists,
/// so partial input formats the way it would while being typed:
/// "11444" → "11.444", "114447770" → "11.444.777/0".
/// Digits past the 14th are dropped.
pub fn format(input: &str) -> String {
    let cleaned = strip(input);
    let mut formatted = String::with_capacity(18);

    for (index, digit) in cleaned.chars().take(CNPJ_LENGTH).enumerate() {
        match index {
            2 | 5 => formatted.push('.'),
            8 => formatted.push('/'),
            12 => formatted.push('-'),
            _ => {}
        }
        formatted.push(digit);
    }

    formatted
}

// ============================================================================
// CNPJ NEWTYPE
// ============================================================================

/// A CNPJ known to be valid (stored as 14 bare digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cnpj(String);

impl Cnpj {
    /// Bare digits, as sent to the API
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// Display mask
    pub fn formatted(&self) -> String {
        format(&self.0)
    }
}

/// Rejected CNPJ input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid CNPJ: {0}")]
pub struct InvalidCnpj(pub String);

impl FromStr for Cnpj {
    type Err = InvalidCnpj;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if validate(s) {
            Ok(Cnpj(strip(s)))
        } else {
            Err(InvalidCnpj(s.to_string()))
        }
    }
}

impl TryFrom<String> for Cnpj {
    type Error = InvalidCnpj;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Cnpj> for String {
    fn from(cnpj: Cnpj) -> Self {
        cnpj.0
    }
}

impl fmt::Display for Cnpj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_known_valid() {
        assert!(validate("11444777000161"));
        assert!(validate("11.444.777/0001-61"));
        assert!(validate("11222333000181"));
    }

    #[test]
    fn test_validate_degenerate_numbers() {
        for digit in 0..=9 {
            let repeated = digit.to_string().repeat(14);
            assert!(!validate(&repeated), "{} should be invalid", repeated);
        }
    }

    #[test]
    fn test_validate_wrong_check_digits() {
        // Second check digit wrong
        assert!(!validate("11444777000162"));
        // First check digit wrong
        assert!(!validate("11444777000171"));
    }

    #[test]
    fn test_validate_wrong_length() {
        assert!(!validate(""));
        assert!(!validate("1144477700016"));
        assert!(!validate("114447770001610"));
        assert!(!validate("abc"));
    }

    #[test]
    fn test_validate_every_single_digit_corruption() {
        let valid = "11444777000161";

        for position in 0..14 {
            for replacement in '0'..='9' {
                let mut corrupted: Vec<char> = valid.chars().collect();
                if corrupted[position] == replacement {
                    continue;
                }
                corrupted[position] = replacement;
                let corrupted: String = corrupted.into_iter().collect();

                assert!(
                    !validate(&corrupted),
                    "single-digit change at {} should invalidate: {}",
                    position,
                    corrupted
                );
            }
        }
    }

    #[test]
    fn test_check_digits() {
        assert_eq!(check_digits("114447770001"), Some((6, 1)));
        assert_eq!(check_digits("11.444.777/0001"), Some((6, 1)));
        assert_eq!(check_digits("1144477700"), None);
    }

    #[test]
    fn test_check_digits_agree_with_validate() {
        for base in ["112223330001", "000000010001", "987654320001", "123456780001"] {
            let (first, second) = check_digits(base).unwrap();
            let full = format!("{}{}{}", base, first, second);
            assert!(validate(&full), "{} should validate", full);
        }
    }

    #[test]
    fn test_check_three_state() {
        assert_eq!(check(""), None);
        assert_eq!(check("11.444.777/0001-6"), None);
        assert_eq!(check("11.444.777/0001-61"), Some(true));
        assert_eq!(check("11.444.777/0001-62"), Some(false));
        assert_eq!(check("11111111111111"), Some(false));
    }

    #[test]
    fn test_format_complete() {
        assert_eq!(format("11444777000161"), "11.444.777/0001-61");
        assert_eq!(format("11.444.777/0001-61"), "11.444.777/0001-61");
    }

    #[test]
    fn test_format_partial_input() {
        assert_eq!(format(""), "");
        assert_eq!(format("1"), "1");
        assert_eq!(format("11"), "11");
        assert_eq!(format("114"), "11.4");
        assert_eq!(format("11444"), "11.444");
        assert_eq!(format("114447"), "11.444.7");
        assert_eq!(format("11444777"), "11.444.777");
        assert_eq!(format("114447770"), "11.444.777/0");
        assert_eq!(format("114447770001"), "11.444.777/0001");
        assert_eq!(format("1144477700016"), "11.444.777/0001-6");
    }

    #[test]
    fn test_format_drops_extra_digits() {
        assert_eq!(format("1144477700016199"), "11.444.777/0001-61");
    }

    #[test]
    fn test_format_is_idempotent_while_typing() {
        let mut typed = String::new();
        for digit in "11444777000161".chars() {
            typed.push(digit);
            typed = format(&typed);
        }
        assert_eq!(typed, "11.444.777/0001-61");
    }

    #[test]
    fn test_cnpj_newtype() {
        let cnpj: Cnpj = "11.444.777/0001-61".parse().unwrap();
        assert_eq!(cnpj.digits(), "11444777000161");
        assert_eq!(cnpj.to_string(), "11.444.777/0001-61");

        assert!("11444777000162".parse::<Cnpj>().is_err());
    }

    #[test]
    fn test_cnpj_serde() {
        let cnpj: Cnpj = serde_json::from_str("\"11444777000161\"").unwrap();
        assert_eq!(serde_json::to_string(&cnpj).unwrap(), "\"11444777000161\"");

        let invalid: Result<Cnpj, _> = serde_json::from_str("\"11111111111111\"");
        assert!(invalid.is_err());
    }
}
