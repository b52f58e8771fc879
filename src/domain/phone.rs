use serde::{Deserialize, Serialize};

pub const DEFAULT_COUNTRY_CODE: &str = "+1";

/// A phone number split into the structured parts the signing document wants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub country_code: String,
    pub national_number: String,
}

/// Best-effort split of a free-form phone string.
///
/// Never fails: inputs that are neither 10 digits nor `1` + 10 digits keep
/// their digits as-is under the default country code.
pub fn normalize(raw: &str) -> PhoneNumber {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    let national_number = match digits.len() {
        11 if digits.starts_with('1') => digits[1..].to_string(),
        _ => digits,
    };

    PhoneNumber {
        country_code: DEFAULT_COUNTRY_CODE.to_string(),
        national_number,
    }
}

/// Same as [`normalize`] for optional input.
pub fn normalize_opt(raw: Option<&str>) -> PhoneNumber {
    normalize(raw.unwrap_or_default())
}
