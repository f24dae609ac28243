/// Guess the card brand from the leading digits of its number.
pub fn card_brand(number: &str) -> Option<&'static str> {
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 2 {
        return None;
    }
    let prefix = |n: usize| -> u32 {
        digits
            .get(..n.min(digits.len()))
            .and_then(|p| p.parse().ok())
            .unwrap_or(0)
    };

    if digits.starts_with('4') {
        return Some("Visa");
    }
    if (51..=55).contains(&prefix(2)) || (2221..=2720).contains(&prefix(4)) {
        return Some("Mastercard");
    }
    if matches!(prefix(2), 34 | 37) {
        return Some("Amex");
    }
    if digits.starts_with("6011")
        || prefix(2) == 65
        || (644..=649).contains(&prefix(3))
        || (622126..=622925).contains(&prefix(6))
    {
        return Some("Discover");
    }
    if prefix(2) == 36 || prefix(2) == 38 || (300..=305).contains(&prefix(3)) {
        return Some("Diners Club");
    }
    if prefix(2) == 35 {
        return Some("JCB");
    }
    if digits.starts_with("62") || digits.starts_with("81") {
        return Some("UnionPay");
    }
    if matches!(prefix(4), 5018 | 5020 | 5038 | 5893 | 6304 | 6759 | 6761 | 6762 | 6763) {
        return Some("Maestro");
    }
    None
}
