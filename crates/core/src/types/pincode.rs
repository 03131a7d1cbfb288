//! Indian postal index number (PIN code).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Pincode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PincodeError {
    /// Not exactly six characters.
    #[error("pincode must be exactly 6 digits")]
    WrongLength,
    /// Contains a non-digit.
    #[error("pincode must contain only digits")]
    NotNumeric,
    /// Starts with zero (no postal zone 0).
    #[error("pincode cannot start with 0")]
    LeadingZero,
}

/// A six-digit PIN code, used for shipping addresses and delivery estimates.
///
/// ```
/// use bazaar_core::Pincode;
///
/// assert!(Pincode::parse("560001").is_ok());
/// assert!(Pincode::parse("056001").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Pincode(String);

impl Pincode {
    /// Parse a `Pincode`, ignoring surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error unless the input is six ASCII digits not starting with 0.
    pub fn parse(s: &str) -> Result<Self, PincodeError> {
        let s = s.trim();
        if s.len() != 6 {
            return Err(PincodeError::WrongLength);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PincodeError::NotNumeric);
        }
        if s.starts_with('0') {
            return Err(PincodeError::LeadingZero);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the pincode as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pincode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Pincode {
    type Error = PincodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Pincode> for String {
    fn from(pincode: Pincode) -> Self {
        pincode.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert!(Pincode::parse("110001").is_ok());
        assert!(Pincode::parse(" 400050 ").is_ok());
        assert_eq!(Pincode::parse("11001"), Err(PincodeError::WrongLength));
        assert_eq!(Pincode::parse("11000a"), Err(PincodeError::NotNumeric));
        assert_eq!(Pincode::parse("012345"), Err(PincodeError::LeadingZero));
        // Non-ASCII digits have a different byte length and never pass.
        assert!(Pincode::parse("११०००१").is_err());
    }
}
