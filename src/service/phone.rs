//! North American phone mask: `(123) 456-7890`.

const NATIONAL_DIGITS: usize = 10;

fn national_digits(input: &str) -> String {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == NATIONAL_DIGITS + 1 && digits.starts_with('1') {
        digits[1..].to_string()
    } else {
        digits
    }
}

/// As-you-type mask. Keeps digits, drops a leading country `1` on 11 digits,
/// caps at 10 digits and renders `(123`, `(123) 456`, `(123) 456-7890`.
pub fn format_phone(input: &str) -> String {
    let digits: String = national_digits(input).chars().take(NATIONAL_DIGITS).collect();
    match digits.len() {
        0 => String::new(),
        1..=3 => format!("({}", digits),
        4..=6 => format!("({}) {}", &digits[..3], &digits[3..]),
        _ => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
    }
}

/// Full mask for a complete number, or None when it does not have exactly 10 national digits.
pub fn normalize_phone(input: &str) -> Option<String> {
    let digits = national_digits(input);
    if digits.len() != NATIONAL_DIGITS {
        return None;
    }
    Some(format_phone(&digits))
}

/// True when `s` is already in the full mask.
pub fn is_formatted_phone(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 14
        && b[0] == b'('
        && b[4] == b')'
        && b[5] == b' '
        && b[9] == b'-'
        && b.iter()
            .enumerate()
            .filter(|(i, _)| ![0, 4, 5, 9].contains(i))
            .all(|(_, c)| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progressive_mask() {
        assert_eq!(format_phone(""), "");
        assert_eq!(format_phone("5"), "(5");
        assert_eq!(format_phone("555"), "(555");
        assert_eq!(format_phone("5551"), "(555) 1");
        assert_eq!(format_phone("555123"), "(555) 123");
        assert_eq!(format_phone("5551234"), "(555) 123-4");
        assert_eq!(format_phone("555-123-4567"), "(555) 123-4567");
    }

    #[test]
    fn country_code_dropped_and_extra_digits_capped() {
        assert_eq!(format_phone("+1 555 123 4567"), "(555) 123-4567");
        assert_eq!(format_phone("555123456789"), "(555) 123-4567");
    }

    #[test]
    fn normalize_requires_ten_digits() {
        assert_eq!(normalize_phone("1-555-123-4567").as_deref(), Some("(555) 123-4567"));
        assert_eq!(normalize_phone("(555) 123-4567").as_deref(), Some("(555) 123-4567"));
        assert_eq!(normalize_phone("555-1234"), None);
        assert_eq!(normalize_phone("55512345678"), None);
    }

    #[test]
    fn recognises_full_mask_only() {
        assert!(is_formatted_phone("(555) 123-4567"));
        assert!(!is_formatted_phone("(555) 123-456"));
        assert!(!is_formatted_phone("555-123-4567"));
    }
}
