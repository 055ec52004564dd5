//! Free-text and `/add` entry parsing.
//!
//! Recognised free-text formats:
//! - `<word> <number>`: category + amount, e.g. `早餐 15` or `工资 +5000`
//! - `[+-]<number>`: signed amount only, e.g. `+100`, `-30`
//!
//! Anything else is [`ParseOutcome::Ignored`]; numeric-looking but malformed
//! amounts are [`ParseOutcome::Invalid`].

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("金额格式不对：{0}")]
    MalformedAmount(String),

    #[error("金额超出范围：{0}")]
    AmountOutOfRange(String),

    #[error("金额最多保留两位小数：{0}")]
    TooManyDecimals(String),

    #[error("缺少{0}")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEntry {
    pub amount: f64,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Entry(ParsedEntry),
    /// Not an entry at all. Callers decide whether to stay silent or hint.
    Ignored,
    Invalid(ParseError),
}

/// Largest accepted magnitude. Keeps every sum finite and every amount exact
/// to the cent.
pub const MAX_AMOUNT: f64 = 1e12;

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+-]?\d+(?:\.(\d+))?$").expect("static regex"))
}

/// A token that starts like a number (optional sign, then a digit).
fn looks_numeric(token: &str) -> bool {
    let rest = token.strip_prefix(['+', '-']).unwrap_or(token);
    rest.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn has_sign(token: &str) -> bool {
    token.starts_with('+') || token.starts_with('-')
}

/// Parse an amount token: at most two decimals, magnitude at most
/// [`MAX_AMOUNT`].
pub fn parse_amount(token: &str) -> Result<f64, ParseError> {
    let Some(caps) = amount_re().captures(token) else {
        return Err(ParseError::MalformedAmount(token.to_string()));
    };
    if caps.get(1).is_some_and(|frac| frac.as_str().len() > 2) {
        return Err(ParseError::TooManyDecimals(token.to_string()));
    }
    let value = token
        .parse::<f64>()
        .map_err(|_| ParseError::MalformedAmount(token.to_string()))?;
    if !value.is_finite() || value.abs() > MAX_AMOUNT {
        return Err(ParseError::AmountOutOfRange(token.to_string()));
    }
    Ok(value)
}

pub fn parse_entry(text: &str, now: DateTime<Utc>) -> ParseOutcome {
    let text = text.trim();
    if text.is_empty() || text.starts_with('/') {
        return ParseOutcome::Ignored;
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.as_slice() {
        [single] if has_sign(single) && looks_numeric(single) => match parse_amount(single) {
            Ok(amount) => ParseOutcome::Entry(ParsedEntry {
                amount,
                category: None,
                description: None,
                date: now,
            }),
            Err(e) => ParseOutcome::Invalid(e),
        },
        [word, number] if !looks_numeric(word) && looks_numeric(number) => {
            match parse_amount(number) {
                Ok(amount) => ParseOutcome::Entry(ParsedEntry {
                    amount,
                    category: Some(word.to_string()),
                    description: None,
                    date: now,
                }),
                Err(e) => ParseOutcome::Invalid(e),
            }
        }
        _ => ParseOutcome::Ignored,
    }
}

/// Parse `/add <amount> <category> <description...>`.
pub fn parse_add_args(args: &str, now: DateTime<Utc>) -> Result<ParsedEntry, ParseError> {
    let mut parts = args.trim().splitn(3, char::is_whitespace);
    let amount = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingField("金额"))?;
    let amount = parse_amount(amount)?;

    let category = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingField("类别"))?;
    let description = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingField("描述"))?;

    Ok(ParsedEntry {
        amount,
        category: Some(category.to_string()),
        description: Some(description.to_string()),
        date: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn entry(text: &str) -> ParsedEntry {
        match parse_entry(text, now()) {
            ParseOutcome::Entry(e) => e,
            other => panic!("expected entry for {text:?}, got {other:?}"),
        }
    }

    #[test]
    fn parses_category_and_amount() {
        let e = entry("早餐 15");
        assert_eq!(e.category.as_deref(), Some("早餐"));
        assert_eq!(e.amount, 15.0);

        let e = entry("  lunch   12.50 ");
        assert_eq!(e.category.as_deref(), Some("lunch"));
        assert_eq!(e.amount, 12.5);

        assert_eq!(entry("午饭 -15").amount, -15.0);
    }

    #[test]
    fn parses_signed_amount_only() {
        let e = entry("+100");
        assert_eq!(e.amount, 100.0);
        assert_eq!(e.category, None);
        assert_eq!(entry("-30").amount, -30.0);
        assert_eq!(entry("-0.5").amount, -0.5);
    }

    #[test]
    fn ignores_non_entries() {
        for text in [
            "",
            "   ",
            "hello",
            "15",
            "hello there friend",
            "/total",
            "早餐 十五",
            "15 早餐",
            "-_-",
            "a b c 15",
        ] {
            assert_eq!(parse_entry(text, now()), ParseOutcome::Ignored, "{text:?}");
        }
    }

    #[test]
    fn malformed_numbers_are_invalid_not_ignored() {
        for text in ["早餐 15元", "早餐 1.2.3", "+12abc", "早餐 15."] {
            assert!(
                matches!(parse_entry(text, now()), ParseOutcome::Invalid(_)),
                "{text:?}"
            );
        }
    }

    #[test]
    fn overflowing_amount_is_out_of_range() {
        let huge = format!("早餐 {}", "9".repeat(400));
        assert!(matches!(
            parse_entry(&huge, now()),
            ParseOutcome::Invalid(ParseError::AmountOutOfRange(_))
        ));
    }

    #[test]
    fn amounts_are_bounded() {
        assert_eq!(parse_amount("1000000000000"), Ok(MAX_AMOUNT));
        assert_eq!(parse_amount("-1000000000000.00"), Ok(-MAX_AMOUNT));
        assert_eq!(
            parse_amount("1000000000000.01"),
            Err(ParseError::AmountOutOfRange("1000000000000.01".to_string()))
        );
        assert!(matches!(
            parse_entry(&format!("房子 {}", "9".repeat(308)), now()),
            ParseOutcome::Invalid(ParseError::AmountOutOfRange(_))
        ));
    }

    #[test]
    fn amounts_allow_at_most_two_decimals() {
        assert_eq!(parse_amount("0.05"), Ok(0.05));
        assert_eq!(parse_amount("+12.5"), Ok(12.5));
        assert_eq!(
            parse_amount("0.004"),
            Err(ParseError::TooManyDecimals("0.004".to_string()))
        );
        assert!(matches!(
            parse_entry("咖啡 0.004", now()),
            ParseOutcome::Invalid(ParseError::TooManyDecimals(_))
        ));
        assert!(matches!(
            parse_add_args("-1.999 餐饮 午饭", now()),
            Err(ParseError::TooManyDecimals(_))
        ));
    }

    #[test]
    fn add_args_require_three_fields() {
        let e = parse_add_args("12.5 food lunch with bob", now()).unwrap();
        assert_eq!(e.amount, 12.5);
        assert_eq!(e.category.as_deref(), Some("food"));
        assert_eq!(e.description.as_deref(), Some("lunch with bob"));

        assert_eq!(
            parse_add_args("", now()),
            Err(ParseError::MissingField("金额"))
        );
        assert_eq!(
            parse_add_args("12", now()),
            Err(ParseError::MissingField("类别"))
        );
        assert_eq!(
            parse_add_args("12 food", now()),
            Err(ParseError::MissingField("描述"))
        );
        assert!(matches!(
            parse_add_args("abc food lunch", now()),
            Err(ParseError::MalformedAmount(_))
        ));
    }
}
