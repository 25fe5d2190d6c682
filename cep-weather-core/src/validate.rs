use std::fmt;

use crate::error::ValidationError;

/// Number of digits in a Brazilian postal code.
pub const CEP_LENGTH: usize = 8;

/// A postal code reduced to exactly [`CEP_LENGTH`] ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cep(String);

impl Cep {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip every non-digit from `raw` and check the remaining length.
pub fn validate_cep(raw: &str) -> Result<Cep, ValidationError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if digits.is_empty() {
        return Err(ValidationError::Empty);
    }
    if digits.len() != CEP_LENGTH {
        return Err(ValidationError::WrongLength { raw: raw.to_owned(), digits: digits.len() });
    }

    Ok(Cep(digits))
}
