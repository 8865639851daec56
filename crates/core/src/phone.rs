/// Normalizes a callback number to its last 10 digits and formats it as
/// `###-###-####`, dropping any country code in front. Inputs with fewer
/// than 10 digits pass through unchanged so short or partial numbers are
/// preserved for the reviewer.
pub fn format_callback_phone(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 10 {
        return raw.to_string();
    }

    let last_ten: String = digits[digits.len() - 10..].iter().collect();
    format!("{}-{}-{}", &last_ten[..3], &last_ten[3..6], &last_ten[6..])
}

/// True when the string contains enough digits to be dialable at all.
pub fn is_usable_phone(raw: &str) -> bool {
    raw.chars().filter(char::is_ascii_digit).count() >= 7
}
