//! Pure validation of citizen identifiers.
//!
//! Both checks are total functions over strings: malformed input returns
//! `false`, nothing here panics or touches I/O.

/// Checks a 9-digit national identification number against its check digit.
///
/// Digits are weighted alternately by 1 and 2 from the left, any product of
/// 10 or more has its digits summed, and the grand total must be divisible
/// by 10.
pub fn validate_national_id(id: &str) -> bool {
    if id.len() != 9 || !id.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let total: u32 = id
        .bytes()
        .map(|b| u32::from(b - b'0'))
        .enumerate()
        .map(|(i, digit)| {
            let product = digit * if i % 2 == 0 { 1 } else { 2 };
            if product >= 10 { product - 9 } else { product }
        })
        .sum();

    total % 10 == 0
}

/// Checks that a phone number is a local mobile number: the `05` prefix
/// followed by exactly 8 digits, no other formatting accepted.
pub fn validate_phone(phone: &str) -> bool {
    phone.len() == 10 && phone.starts_with("05") && phone.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_accepts_known_valid_ids() {
        assert!(validate_national_id("123456782"));
        assert!(validate_national_id("111111118"));
        assert!(validate_national_id("000000000"));
    }

    #[test]
    fn checksum_rejects_wrong_check_digit() {
        assert!(!validate_national_id("123456789"));
        assert!(!validate_national_id("111111111"));
    }

    #[test]
    fn malformed_ids_are_false_not_panics() {
        assert!(!validate_national_id(""));
        assert!(!validate_national_id("12345678"));
        assert!(!validate_national_id("1234567890"));
        assert!(!validate_national_id("12345678a"));
        assert!(!validate_national_id("١٢٣٤٥٦٧٨٢")); // non-ascii digits
    }

    #[test]
    fn phone_pattern() {
        assert!(validate_phone("0501234567"));
        assert!(validate_phone("0529999999"));
        assert!(!validate_phone("0401234567")); // wrong prefix
        assert!(!validate_phone("050123456")); // too short
        assert!(!validate_phone("05012345678")); // too long
        assert!(!validate_phone("050-123456"));
        assert!(!validate_phone("+0501234567"));
    }
}
