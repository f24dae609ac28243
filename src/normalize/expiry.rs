//! Card expiry heuristics.
//!
//! Expiry values arrive in every shape imaginable: `05/24`, `2024-05`,
//! `052024`, a bare `24`, or a number field that lost its leading zero.
//! Everything here fails open: when the data is ambiguous a card is never
//! reported as expired.

use std::sync::OnceLock;

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;

use crate::models::Card;

const FULL_YEAR: &str = "2[0-1][0-9]{2}";

fn full_year() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!("^{}$", FULL_YEAR)).unwrap())
}

fn full_year_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FULL_YEAR).unwrap())
}

fn month() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^((1[0-2])|(0?[1-9]))$").unwrap())
}

fn is_delimiter(c: char) -> bool {
    matches!(c, '/' | '-' | '.') || c.is_whitespace()
}

fn current_year() -> i32 {
    Local::now().year()
}

/// Normalize a loosely formatted year to four digits, relative to the current year.
pub fn normalize_expiry_year(input: &str) -> Option<String> {
    normalize_expiry_year_at(input, current_year())
}

/// Two-digit (or otherwise mangled) years are placed in the century of `current_year`.
pub fn normalize_expiry_year_at(input: &str, current_year: i32) -> Option<String> {
    if input.is_empty() {
        return None;
    }
    let bytes = input.as_bytes();
    if bytes.len() == 4 && (b'1'..=b'9').contains(&bytes[0]) && input.chars().all(|c| c.is_ascii_digit()) {
        return Some(input.to_string());
    }

    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    // Drop zero padding but keep a lone trailing zero.
    let trimmed = digits.trim_start_matches('0');
    let year = match (trimmed.is_empty(), digits.is_empty()) {
        (_, true) => return None,
        (true, false) => "0",
        (false, false) => trimmed,
    };

    if year.len() == 4 {
        return Some(year.to_string());
    }
    let last_two = &year[year.len().saturating_sub(2)..];
    let century = current_year.to_string();
    let century = &century[..century.len().min(2)];
    Some(format!("{}{:0>2}", century, last_two))
}

/// True only when the expiry is affirmatively in the past.
pub fn is_card_expired(card: &Card) -> bool {
    is_card_expired_at(card, Local::now().date_naive())
}

pub fn is_card_expired_at(card: &Card, today: NaiveDate) -> bool {
    let Some(exp_year) = card.exp_year.as_deref().filter(|y| !y.is_empty()) else {
        return false;
    };
    let Some(year) = normalize_expiry_year_at(exp_year, today.year())
        .and_then(|y| y.parse::<i32>().ok())
    else {
        return false;
    };

    if year < today.year() {
        return true;
    }
    if year > today.year() {
        return false;
    }

    let Some(month) = card.exp_month.as_deref().and_then(parse_leading_int) else {
        return false;
    };
    if !(1..=12).contains(&month) {
        return false;
    }
    // Cards are valid through the last day of the expiry month.
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).is_some_and(|first| first <= today)
}

fn parse_leading_int(value: &str) -> Option<u32> {
    let digits: String = value
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Split a combined expiry string into `(year, month)`.
///
/// The year comes back normalized to four digits; the month without zero
/// padding. Either half is `None` when it cannot be found.
pub fn parse_year_month_expiry(combined: &str) -> (Option<String>, Option<String>) {
    parse_year_month_expiry_at(combined, current_year())
}

pub fn parse_year_month_expiry_at(combined: &str, current_year: i32) -> (Option<String>, Option<String>) {
    let parts = split_date_parts(combined);
    let (year, month) = match parts.as_slice() {
        [] => return (None, None),
        [single] => parse_non_delimited(single, current_year),
        [first, second, ..] => {
            let (y, m) = parse_delimited(first, second);
            (Some(y.to_string()), Some(m.to_string()))
        }
    };

    let year = year
        .filter(|y| !y.is_empty())
        .and_then(|y| normalize_expiry_year_at(&y, current_year))
        .filter(|y| !y.is_empty());
    let month = month
        .map(|m| m.trim_start_matches('0').chars().take(2).collect::<String>())
        .filter(|m| !m.is_empty());
    (year, month)
}

fn split_date_parts(combined: &str) -> Vec<String> {
    let sanitized: String = combined
        .chars()
        .filter(|c| c.is_ascii_digit() || is_delimiter(*c))
        .collect();
    let sanitized = sanitized.trim();

    let Some(delimiter) = sanitized.chars().find(|c| is_delimiter(*c)) else {
        return if sanitized.is_empty() {
            Vec::new()
        } else {
            vec![sanitized.to_string()]
        };
    };

    let same_delimiter = |c: char| {
        if delimiter.is_whitespace() {
            c.is_whitespace()
        } else {
            c == delimiter
        }
    };
    let kept: String = sanitized
        .chars()
        .filter(|c| c.is_ascii_digit() || same_delimiter(*c))
        .collect();
    kept.split(same_delimiter)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

// Returns (year, month), most authoritative rule first.
fn parse_delimited<'a>(first: &'a str, second: &'a str) -> (&'a str, &'a str) {
    if full_year().is_match(first) {
        return (first, second);
    }
    if full_year().is_match(second) {
        return (second, first);
    }
    if first.len() >= 2 && !month().is_match(first) {
        return (first, second);
    }
    if second.len() >= 2 && !month().is_match(second) {
        return (second, first);
    }
    // Fully ambiguous ("12/09"): a month-looking first part is the month.
    if month().is_match(first) {
        (second, first)
    } else {
        (first, second)
    }
}

fn parse_non_delimited(input: &str, current_year: i32) -> (Option<String>, Option<String>) {
    let len = input.len();

    if len > 4 {
        // Cut around every full-year run, then the longest piece is the year.
        let mut cuts: Vec<usize> = Vec::new();
        for i in 1..len {
            let starts_year = full_year_run().find_at(input, i).is_some_and(|m| m.start() == i);
            let ends_year = i >= 4 && full_year().is_match(&input[i - 4..i]);
            if starts_year || ends_year {
                cuts.push(i);
            }
        }
        let mut pieces = split_at_positions(input, &cuts);
        pieces.sort_by(|a, b| b.len().cmp(&a.len()));
        let mut pieces = pieces.into_iter();
        return (pieces.next(), pieces.next());
    }

    if len == 4 {
        let (first_half, second_half) = input.split_at(2);
        return if month().is_match(first_half) {
            (Some(second_half.to_string()), Some(first_half.to_string()))
        } else {
            (Some(first_half.to_string()), Some(second_half.to_string()))
        };
    }

    // Three characters or fewer. A zero-led digit pair marks the month.
    let bytes = input.as_bytes();
    let zero_pair = |i: usize| i + 1 < len && bytes[i] == b'0' && (b'1'..=b'9').contains(&bytes[i + 1]);
    let cuts: Vec<usize> = (1..len)
        .filter(|&i| zero_pair(i) || (i >= 2 && zero_pair(i - 2)))
        .collect();
    let pieces = split_at_positions(input, &cuts);

    if pieces.len() > 1 {
        return if pieces[0].starts_with('0') {
            (Some(pieces[1].clone()), Some(pieces[0].clone()))
        } else {
            (Some(pieces[0].clone()), Some(pieces[1].clone()))
        };
    }

    // "YYM" unless that year is already past and "MYY" is not.
    let head = &input[..len.min(2)];
    let tail = &input[len.saturating_sub(2)..];
    let as_year = |s: &str| {
        normalize_expiry_year_at(s, current_year)
            .and_then(|y| y.parse::<i32>().ok())
            .filter(|y| *y != 0)
    };
    let head_year = as_year(head);
    let tail_year = as_year(tail);
    if head_year.is_some_and(|y| y < current_year) && tail_year.is_some_and(|y| y >= current_year) {
        return (Some(tail.to_string()), Some(input[..1.min(len)].to_string()));
    }
    (Some(head.to_string()), Some(input[len.saturating_sub(1)..].to_string()))
}

fn split_at_positions(input: &str, cuts: &[usize]) -> Vec<String> {
    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for &cut in cuts {
        pieces.push(input[start..cut].to_string());
        start = cut;
    }
    pieces.push(input[start..].to_string());
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn century() -> String {
        current_year().to_string()[..2].to_string()
    }

    #[test]
    fn normalize_year_vectors() {
        let cc = century();
        assert_eq!(normalize_expiry_year("0000"), Some(format!("{}00", cc)));
        assert_eq!(normalize_expiry_year("0"), Some(format!("{}00", cc)));
        assert_eq!(normalize_expiry_year("-12"), Some(format!("{}12", cc)));
        assert_eq!(normalize_expiry_year("31423524543"), Some(format!("{}43", cc)));
        assert_eq!(normalize_expiry_year("0234234"), Some(format!("{}34", cc)));
        assert_eq!(normalize_expiry_year("3054"), Some("3054".to_string()));
        assert_eq!(normalize_expiry_year("2.4"), Some(format!("{}24", cc)));
        assert_eq!(
            normalize_expiry_year("agdredg42grg35grrr. ea3534@#^145345ag$%^  -_#$rdg "),
            Some(format!("{}45", cc))
        );
        assert_eq!(normalize_expiry_year("aaaa"), None);
        assert_eq!(normalize_expiry_year(""), None);
    }

    #[test]
    fn normalize_year_follows_the_given_year() {
        assert_eq!(normalize_expiry_year_at("24", 2024), Some("2024".to_string()));
        assert_eq!(normalize_expiry_year_at("7", 2131), Some("2107".to_string()));
    }

    #[test]
    fn normalized_years_are_four_digits() {
        for n in 0..10_000u32 {
            for input in [n.to_string(), format!("{:04}", n)] {
                if let Some(year) = normalize_expiry_year(&input) {
                    assert_eq!(year.len(), 4, "input {}", input);
                    assert_eq!(normalize_expiry_year(&year), Some(year.clone()));
                }
            }
        }
    }

    fn card(month: Option<&str>, year: Option<&str>) -> Card {
        Card {
            exp_month: month.map(str::to_string),
            exp_year: year.map(str::to_string),
            ..Card::default()
        }
    }

    #[test]
    fn expired_when_year_is_past() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        for month in [None, Some("1"), Some("12"), Some("13"), Some("xx")] {
            assert!(is_card_expired_at(&card(month, Some("2023")), today));
            assert!(is_card_expired_at(&card(month, Some("23")), today));
        }
    }

    #[test]
    fn current_year_checks_month() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert!(is_card_expired_at(&card(Some("5"), Some("2024")), today));
        assert!(is_card_expired_at(&card(Some("05"), Some("24")), today));
        assert!(!is_card_expired_at(&card(Some("6"), Some("2024")), today));
        assert!(!is_card_expired_at(&card(Some("12"), Some("2024")), today));

        let first = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert!(is_card_expired_at(&card(Some("6"), Some("2024")), first));
    }

    #[test]
    fn ambiguity_fails_open() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert!(!is_card_expired_at(&card(Some("1"), None), today));
        assert!(!is_card_expired_at(&card(Some("1"), Some("")), today));
        assert!(!is_card_expired_at(&card(None, Some("2024")), today));
        assert!(!is_card_expired_at(&card(Some("0"), Some("2024")), today));
        assert!(!is_card_expired_at(&card(Some("13"), Some("2024")), today));
        assert!(!is_card_expired_at(&card(Some("nope"), Some("2024")), today));
        assert!(!is_card_expired_at(&card(Some("1"), Some("2025")), today));
    }

    #[test]
    fn common_formats_parse_to_year_and_month() {
        let expected = (Some("2024".to_string()), Some("5".to_string()));
        let inputs = [
            "05/2024", "2024/05", "5/2024", "05/24", "5/24", "2024-05", "05-2024", "5-24",
            "2024.05", "05.24", "5 24", "05 2024", "2024 5", "052024", "202405", "20245",
            "52024", "0524", "2405", " 2024 / 05 ", "05\u{2009}2024", "05\u{00a0}24",
            "05\u{3000}/\u{3000}24", "Exp: 05/24",
        ];
        for input in inputs {
            assert_eq!(parse_year_month_expiry_at(input, 2024), expected, "input {:?}", input);
        }
    }

    #[test]
    fn empty_inputs_give_nothing() {
        assert_eq!(parse_year_month_expiry(""), (None, None));
        assert_eq!(parse_year_month_expiry("/"), (None, None));
        assert_eq!(parse_year_month_expiry("  -- "), (None, None));
        assert_eq!(parse_year_month_expiry("abc"), (None, None));
    }

    #[test]
    fn ambiguous_delimited_prefers_month_first() {
        assert_eq!(
            parse_year_month_expiry_at("12/09", 2024),
            (Some("2009".to_string()), Some("12".to_string()))
        );
        assert_eq!(
            parse_year_month_expiry_at("13/09", 2024),
            (Some("2013".to_string()), Some("9".to_string()))
        );
    }

    #[test]
    fn short_inputs() {
        // Zero-led pair is the month.
        assert_eq!(
            parse_year_month_expiry_at("202", 2024),
            (Some("2002".to_string()), Some("2".to_string()))
        );
        assert_eq!(
            parse_year_month_expiry_at("022", 2024),
            (Some("2002".to_string()), Some("2".to_string()))
        );
        assert_eq!(
            parse_year_month_expiry_at("245", 2024),
            (Some("2024".to_string()), Some("5".to_string()))
        );
        // "12" is already past but "29" is not, so month first.
        assert_eq!(
            parse_year_month_expiry_at("129", 2024),
            (Some("2029".to_string()), Some("1".to_string()))
        );
        assert_eq!(
            parse_year_month_expiry_at("212", 2024),
            (Some("2021".to_string()), Some("2".to_string()))
        );
        // Accepted ambiguity: could be 1/2011 or 11/2001.
        assert_eq!(
            parse_year_month_expiry_at("111", 2024),
            (Some("2011".to_string()), Some("1".to_string()))
        );
        assert_eq!(
            parse_year_month_expiry_at("5", 2024),
            (Some("2005".to_string()), Some("5".to_string()))
        );
    }

    #[test]
    fn long_input_without_full_year_is_all_year() {
        assert_eq!(
            parse_year_month_expiry_at("99999", 2024),
            (Some("2099".to_string()), None)
        );
    }
}
