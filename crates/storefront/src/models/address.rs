//! Shipping address types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{AddressId, Pincode, UserId};

const MAX_FIELD_CHARS: usize = 200;

/// A saved shipping address.
#[derive(Debug, Clone, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub details: AddressDetails,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated address fields, also snapshotted onto orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDetails {
    pub full_name: String,
    /// 10-digit mobile number.
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: Pincode,
}

/// Address create/update payload before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl AddressInput {
    /// Validate and normalise the input.
    ///
    /// Phone numbers may contain spaces, dashes or a `+91` prefix; the
    /// stored form is the bare 10 digits.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message describing the first invalid field.
    pub fn validate(self) -> Result<AddressDetails, String> {
        let full_name = required("full_name", &self.full_name)?;
        let line1 = required("line1", &self.line1)?;
        let city = required("city", &self.city)?;
        let state = required("state", &self.state)?;
        let line2 = match self.line2.as_deref().map(str::trim) {
            Some(line) if !line.is_empty() => Some(required("line2", line)?),
            _ => None,
        };
        let phone = normalize_phone(&self.phone)?;
        let pincode = Pincode::parse(self.pincode.trim()).map_err(|e| format!("pincode: {e}"))?;

        Ok(AddressDetails {
            full_name,
            phone,
            line1,
            line2,
            city,
            state,
            pincode,
        })
    }
}

fn required(field: &str, value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{field} is required"));
    }
    if value.chars().count() > MAX_FIELD_CHARS {
        return Err(format!("{field} must be at most {MAX_FIELD_CHARS} characters"));
    }
    Ok(value.to_owned())
}

fn normalize_phone(raw: &str) -> Result<String, String> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = digits.strip_prefix("+91").unwrap_or(&digits);

    if digits.len() == 10 && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(digits.to_owned())
    } else {
        Err("phone must be a 10-digit mobile number".to_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            full_name: " Asha Rao ".to_string(),
            phone: "+91 98450-12345".to_string(),
            line1: "12 MG Road".to_string(),
            line2: Some("  ".to_string()),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pincode: "560001".to_string(),
        }
    }

    #[test]
    fn test_validate_normalises() {
        let details = input().validate().unwrap();
        assert_eq!(details.full_name, "Asha Rao");
        assert_eq!(details.phone, "9845012345");
        assert_eq!(details.line2, None);
        assert_eq!(details.pincode.as_str(), "560001");
    }

    #[test]
    fn test_validate_rejects_short_phone() {
        let mut bad = input();
        bad.phone = "12345".to_string();
        assert!(bad.validate().unwrap_err().contains("phone"));
    }

    #[test]
    fn test_validate_rejects_bad_pincode() {
        let mut bad = input();
        bad.pincode = "060001".to_string();
        assert!(bad.validate().unwrap_err().starts_with("pincode"));
    }

    #[test]
    fn test_validate_requires_fields() {
        let mut bad = input();
        bad.city = "   ".to_string();
        assert_eq!(bad.validate().unwrap_err(), "city is required");
    }
}
