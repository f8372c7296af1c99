//! CPF (Brazilian taxpayer id) validation.

use thiserror::Error;

pub const CPF_LENGTH: usize = 11;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CpfError {
    #[error("CPF must contain exactly {CPF_LENGTH} digits")]
    InvalidFormat,
    #[error("invalid CPF")]
    Invalid,
}

/// A CPF that passed the checksum, stored as its 11 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cpf(String);

impl Cpf {
    /// Normalize `raw` (drop everything but digits) and validate it.
    ///
    /// # Errors
    /// `InvalidFormat` unless exactly 11 digits remain, `Invalid` for repeated
    /// digits or a checksum mismatch.
    pub fn parse(raw: &str) -> Result<Self, CpfError> {
        let digits = normalize(raw);
        if digits.len() != CPF_LENGTH {
            return Err(CpfError::InvalidFormat);
        }

        let values: Vec<u8> = digits.bytes().map(|b| b - b'0').collect();

        // well-formed but never issued: 000.000.000-00, 111.111.111-11, ...
        if values.iter().all(|&d| d == values[0]) {
            return Err(CpfError::Invalid);
        }

        if check_digit(&values[..9]) != values[9] || check_digit(&values[..10]) != values[10] {
            return Err(CpfError::Invalid);
        }

        Ok(Self(digits))
    }

    #[must_use]
    pub fn digits(&self) -> &str {
        &self.0
    }
}

/// Strip every non-digit character.
fn normalize(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

// Weights run from len+1 down to 2; a result of 10 or 11 maps to 0.
fn check_digit(digits: &[u8]) -> u8 {
    let weight_start = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .zip((2..=weight_start).rev())
        .map(|(&d, w)| u32::from(d) * w)
        .sum();

    let digit = 11 - (sum % 11);
    if digit >= 10 {
        0
    } else {
        digit as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn is_valid(raw: &str) -> bool {
        Cpf::parse(raw).is_ok()
    }

    #[test]
    fn test_valid_cpfs() {
        assert!(is_valid("52998224725"));
        assert!(is_valid("11144477735"));
    }

    #[test]
    fn test_checksum_mismatch() {
        assert_eq!(Cpf::parse("52998224724"), Err(CpfError::Invalid));
        assert_eq!(Cpf::parse("52998224715"), Err(CpfError::Invalid));
        assert_eq!(Cpf::parse("11144477736"), Err(CpfError::Invalid));
    }

    #[test]
    fn test_repeated_digits_rejected() {
        for d in 0..=9 {
            let cpf = d.to_string().repeat(CPF_LENGTH);
            assert_eq!(Cpf::parse(&cpf), Err(CpfError::Invalid), "{cpf}");
        }
    }

    #[test]
    fn test_wrong_length() {
        assert_eq!(Cpf::parse(""), Err(CpfError::InvalidFormat));
        assert_eq!(Cpf::parse("5299822472"), Err(CpfError::InvalidFormat));
        assert_eq!(Cpf::parse("529982247250"), Err(CpfError::InvalidFormat));
        assert_eq!(Cpf::parse("abc.def.ghi-jk"), Err(CpfError::InvalidFormat));
    }

    #[test]
    fn test_punctuation_is_ignored() {
        let cpf = Cpf::parse("529.982.247-25");
        assert_eq!(cpf.as_ref().map(Cpf::digits), Ok("52998224725"));
        assert!(is_valid(" 529 982 247 25 "));
        assert!(is_valid("529.982.247-25abc"));
    }

    #[test]
    fn test_check_digit_maps_ten_and_eleven_to_zero() {
        // sum = 0 -> 11 - 0 = 11
        assert_eq!(check_digit(&[0; 9]), 0);
        // sum = 12, 12 % 11 = 1 -> 10
        assert_eq!(check_digit(&[0, 0, 0, 0, 0, 0, 0, 0, 6]), 0);
        assert_eq!(check_digit(&[5, 2, 9, 9, 8, 2, 2, 4, 7]), 2);
        assert_eq!(check_digit(&[5, 2, 9, 9, 8, 2, 2, 4, 7, 2]), 5);
    }

    #[test]
    fn test_validity_is_formatting_invariant() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let mut digits: Vec<u8> = (0..9).map(|_| rng.gen_range(0..10)).collect();
            let first = check_digit(&digits);
            digits.push(first);
            let second = check_digit(&digits);
            digits.push(second);

            // corrupt the last digit half of the time
            if rng.gen_bool(0.5) {
                digits[10] = (digits[10] + 1) % 10;
            }

            let plain: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
            let punctuated = format!(
                "{}.{}.{}-{}",
                &plain[0..3],
                &plain[3..6],
                &plain[6..9],
                &plain[9..11]
            );

            assert_eq!(is_valid(&plain), is_valid(&punctuated), "{plain}");
        }
    }

    #[test]
    fn test_checksum_digits_decide_validity() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let digits: Vec<u8> = (0..11).map(|_| rng.gen_range(0..10)).collect();
            let plain: String = digits.iter().map(|d| char::from(b'0' + d)).collect();

            let repeated = digits.iter().all(|&d| d == digits[0]);
            let expected = !repeated
                && check_digit(&digits[..9]) == digits[9]
                && check_digit(&digits[..10]) == digits[10];

            assert_eq!(is_valid(&plain), expected, "{plain}");
        }
    }
}
