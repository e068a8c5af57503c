//! Recipient address validation.
//!
//! Email validation is deliberately permissive (RFC-style addresses pass);
//! phone validation targets US numbers and normalizes to E.164.

/// Validate an email address.
///
/// Rejects empty input, anything without an `@`, anything containing
/// whitespace, and addresses with an empty local part or domain.
#[must_use]
pub fn is_valid_email(address: &str) -> bool {
    if address.is_empty() || address.chars().any(char::is_whitespace) {
        return false;
    }

    address
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
}

/// Validate a US phone number.
///
/// After stripping non-digits, accepts 10 digits whose first digit is 2-9,
/// or 11 digits with a leading `1` whose second digit is 2-9.
#[must_use]
pub fn is_valid_us_phone(phone: &str) -> bool {
    national_digits(phone).is_some()
}

/// Format a US phone number as E.164 (`+1` followed by 10 digits).
///
/// On any validation failure the input is returned unchanged so callers can
/// log the raw value.
#[must_use]
pub fn format_e164(phone: &str) -> String {
    national_digits(phone).map_or_else(|| phone.to_string(), |digits| format!("+1{digits}"))
}

/// The 10 national digits of a valid US number, or `None`.
fn national_digits(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();

    let national = match digits.len() {
        10 => digits,
        11 if digits.starts_with('1') => digits[1..].to_string(),
        _ => return None,
    };

    // NANP area codes never begin with 0 or 1
    matches!(national.bytes().next(), Some(b'2'..=b'9')).then_some(national)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("spaced user@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
    }

    #[test]
    fn test_valid_us_phones() {
        assert!(is_valid_us_phone("2125551234"));
        assert!(is_valid_us_phone("(212) 555-1234"));
        assert!(is_valid_us_phone("1-212-555-1234"));
        assert!(is_valid_us_phone("+1 212 555 1234"));
    }

    #[test]
    fn test_ten_digit_leading_zero_or_one_invalid() {
        assert!(!is_valid_us_phone("0125551234"));
        assert!(!is_valid_us_phone("1125551234"));
    }

    #[test]
    fn test_eleven_digit_must_lead_with_one() {
        assert!(!is_valid_us_phone("22125551234"));
        // 11 digits leading 1, but second digit 0 makes an invalid area code
        assert!(!is_valid_us_phone("10125551234"));
    }

    #[test]
    fn test_format_e164_shape() {
        let formatted = format_e164("(212) 555-1234");
        assert_eq!(formatted, "+12125551234");
        assert!(formatted.starts_with("+1"));
        assert_eq!(formatted.len(), 12);
    }

    #[test]
    fn test_format_e164_is_idempotent() {
        let once = format_e164("1 (212) 555-1234");
        assert_eq!(format_e164(&once), once);
    }

    #[test]
    fn test_format_e164_returns_input_on_failure() {
        assert_eq!(format_e164("not a number"), "not a number");
        assert_eq!(format_e164("012-555-1234"), "012-555-1234");
    }
}
