// Turns raw listing fields into typed values. Nothing in here fails: malformed
// input becomes an absent price or a zero sold-count.

use crate::config::Locale;
use crate::models::{Listing, RawListing, RawPrice};

pub fn parse_price(raw: &RawPrice, locale: &Locale) -> Option<f64> {
    match raw {
        RawPrice::Number(n) => valid_price(*n),
        RawPrice::Text(text) => parse_price_text(text, locale),
        RawPrice::Missing => None,
    }
}

fn valid_price(n: f64) -> Option<f64> {
    (n.is_finite() && n >= 0.0).then_some(n)
}

fn parse_price_text(text: &str, locale: &Locale) -> Option<f64> {
    let trimmed = text.trim();
    let without_symbol = trimmed
        .strip_prefix(locale.currency_symbol.as_str())
        .unwrap_or(trimmed);
    // char::is_whitespace covers the non-breaking space pages put after "R$"
    let compact: String = without_symbol.chars().filter(|c| !c.is_whitespace()).collect();

    let allowed = |c: char| {
        c.is_ascii_digit() || c == locale.thousands_separator || c == locale.decimal_separator
    };
    if compact.is_empty() || !compact.chars().all(allowed) {
        return None;
    }

    let (int_part, frac_part) = match compact.split_once(locale.decimal_separator) {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (compact.as_str(), None),
    };
    let digits: String = int_part
        .chars()
        .filter(|c| *c != locale.thousands_separator)
        .collect();
    if digits.is_empty() {
        return None;
    }

    let normalized = match frac_part {
        Some(frac) if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) => return None,
        Some(frac) => format!("{digits}.{frac}"),
        None => digits,
    };
    normalized.parse::<f64>().ok().and_then(valid_price)
}

/// Joins the integer and cents parts that listing pages render in separate
/// elements.
pub fn compose_price(whole: &str, cents: Option<&str>, locale: &Locale) -> RawPrice {
    let whole = whole.trim();
    if whole.is_empty() {
        return RawPrice::Missing;
    }
    match cents.map(str::trim).filter(|c| !c.is_empty()) {
        Some(cents) => RawPrice::Text(format!("{whole}{}{cents}", locale.decimal_separator)),
        None => RawPrice::Text(whole.to_string()),
    }
}

/// Parses labels such as "+1,2mil vendidos", "1.234" or "50+". Anything that
/// cannot be read is 0.
pub fn parse_sold(raw: &str, locale: &Locale) -> u64 {
    let mut text = raw.trim().to_lowercase();

    let mut words: Vec<String> = locale.sold_label_words.iter().map(|w| w.to_lowercase()).collect();
    // "vendidos" must go before "vendido"
    words.sort_by_key(|w| std::cmp::Reverse(w.len()));
    for word in words.iter().filter(|w| !w.is_empty()) {
        text = text.replace(word.as_str(), "");
    }

    let text = text.trim().trim_matches('+').trim();
    if text.is_empty() {
        return 0;
    }

    let suffix = locale.thousand_suffix.to_lowercase();
    if !suffix.is_empty() {
        if let Some(prefix) = text.strip_suffix(suffix.as_str()) {
            return scale_thousands(prefix.trim(), locale).unwrap_or(0);
        }
    }

    let digits: String = text
        .chars()
        .filter(|c| *c != locale.thousands_separator)
        .collect();
    digits.parse::<u64>().unwrap_or(0)
}

// floor(prefix * 1000) without going through floats: "1,25" -> 1250
fn scale_thousands(prefix: &str, locale: &Locale) -> Option<u64> {
    let (int_part, frac_part) = prefix
        .split_once(locale.decimal_separator)
        .unwrap_or((prefix, ""));
    let int_digits: String = int_part
        .chars()
        .filter(|c| *c != locale.thousands_separator)
        .collect();
    if int_digits.is_empty()
        || !int_digits.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let whole: u64 = int_digits.parse().ok()?;
    let mut frac: String = frac_part.chars().take(3).collect();
    while frac.len() < 3 {
        frac.push('0');
    }
    let thousandths: u64 = frac.parse().ok()?;

    whole.checked_mul(1000)?.checked_add(thousandths)
}

fn group_thousands(n: u64, separator: char) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

/// Renders a sold-count with the locale's thousands separator; 0 is shown as
/// the missing sentinel.
pub fn format_count(n: u64, locale: &Locale) -> String {
    if n == 0 {
        return locale.missing_label.clone();
    }
    group_thousands(n, locale.thousands_separator)
}

/// Display form of a raw sold label. Plain integers are regrouped, anything
/// else is shown as received.
pub fn display_sold(raw: &str, locale: &Locale) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(&locale.missing_label) {
        return locale.missing_label.clone();
    }
    match trimmed.parse::<u64>() {
        Ok(n) => format_count(n, locale),
        Err(_) => raw.to_string(),
    }
}

pub fn format_price(price: Option<f64>, locale: &Locale) -> String {
    let Some(price) = price.and_then(valid_price) else {
        return locale.missing_label.clone();
    };
    let cents = (price * 100.0).round() as u64;
    format!(
        "{}{}{:02}",
        group_thousands(cents / 100, locale.thousands_separator),
        locale.decimal_separator,
        cents % 100
    )
}

/// Money amount that may be negative (fees, profit). Only non-finite values
/// fall back to the missing sentinel.
pub fn format_money(amount: f64, locale: &Locale) -> String {
    if !amount.is_finite() {
        return locale.missing_label.clone();
    }
    let magnitude = format_price(Some(amount.abs()), locale);
    if (amount * 100.0).round() < 0.0 {
        format!("-{}", magnitude)
    } else {
        magnitude
    }
}

pub fn normalize(raw: RawListing, locale: &Locale) -> Listing {
    let price = parse_price(&raw.price, locale);
    let sold = parse_sold(&raw.sold, locale);
    Listing {
        id: raw.id,
        title: raw.title.trim().to_string(),
        price,
        raw_price: raw.price.display(),
        sold,
        raw_sold: raw.sold,
        condition: raw.condition,
        free_shipping: raw.free_shipping,
        fulfillment: raw.fulfillment,
        permalink: raw.permalink,
        created: raw.created,
        thumbnail: raw.thumbnail,
        page: raw.page,
    }
}

pub fn normalize_all(raw: Vec<RawListing>, locale: &Locale) -> Vec<Listing> {
    raw.into_iter().map(|r| normalize(r, locale)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Condition, DetailField};

    fn text(s: &str) -> RawPrice {
        RawPrice::Text(s.to_string())
    }

    #[test]
    fn parses_locale_formatted_prices() {
        let locale = Locale::default();
        assert_eq!(parse_price(&text("1.234,56"), &locale), Some(1234.56));
        assert_eq!(parse_price(&text("R$ 99,90"), &locale), Some(99.9));
        assert_eq!(parse_price(&text("R$\u{a0}1.000"), &locale), Some(1000.0));
        assert_eq!(parse_price(&text("35"), &locale), Some(35.0));
        assert_eq!(parse_price(&RawPrice::Number(12.5), &locale), Some(12.5));
    }

    #[test]
    fn malformed_prices_are_absent_not_zero() {
        let locale = Locale::default();
        for bad in ["", "   ", "abc", "-5,00", "12,", "1,2,3", "R$", "R$ grátis", ",50"] {
            assert_eq!(parse_price(&text(bad), &locale), None, "{bad:?}");
        }
        assert_eq!(parse_price(&RawPrice::Missing, &locale), None);
        assert_eq!(parse_price(&RawPrice::Number(-1.0), &locale), None);
        assert_eq!(parse_price(&RawPrice::Number(f64::NAN), &locale), None);
    }

    #[test]
    fn compose_price_joins_whole_and_cents() {
        let locale = Locale::default();
        assert_eq!(compose_price("1.299", Some("90"), &locale), text("1.299,90"));
        assert_eq!(compose_price("45", None, &locale), text("45"));
        assert_eq!(compose_price("45", Some(" "), &locale), text("45"));
        assert_eq!(compose_price("", Some("90"), &locale), RawPrice::Missing);
    }

    #[test]
    fn sold_counts_with_thousand_suffix() {
        let locale = Locale::default();
        assert_eq!(parse_sold("1,2 mil", &locale), 1200);
        assert_eq!(parse_sold("1,5mil", &locale), 1500);
        assert_eq!(parse_sold("10 mil", &locale), 10000);
        assert_eq!(parse_sold("+1,2mil vendidos", &locale), 1200);
        assert_eq!(parse_sold("+10MIL", &locale), 10000);
        // floor, not round
        assert_eq!(parse_sold("1,2345mil", &locale), 1234);
        assert_eq!(parse_sold("1,15mil", &locale), 1150);
    }

    #[test]
    fn sold_counts_plain_and_malformed() {
        let locale = Locale::default();
        assert_eq!(parse_sold("50+", &locale), 50);
        assert_eq!(parse_sold("+5 vendidos", &locale), 5);
        assert_eq!(parse_sold("1 vendido", &locale), 1);
        assert_eq!(parse_sold("1.234", &locale), 1234);
        for bad in ["", "+", "N/A", "mil", "muitos", "+ vendidos", "1,2", "abc mil"] {
            assert_eq!(parse_sold(bad, &locale), 0, "{bad:?}");
        }
    }

    #[test]
    fn formats_counts_and_prices() {
        let locale = Locale::default();
        assert_eq!(format_count(0, &locale), "N/A");
        assert_eq!(format_count(999, &locale), "999");
        assert_eq!(format_count(1200, &locale), "1.200");
        assert_eq!(format_count(1234567, &locale), "1.234.567");
        assert_eq!(format_price(None, &locale), "N/A");
        assert_eq!(format_price(Some(5.0), &locale), "5,00");
        assert_eq!(format_price(Some(1234.5), &locale), "1.234,50");
    }

    #[test]
    fn money_keeps_the_sign_of_losses() {
        let locale = Locale::default();
        assert_eq!(format_money(-19.75, &locale), "-19,75");
        assert_eq!(format_money(-1234.5, &locale), "-1.234,50");
        assert_eq!(format_money(16.15, &locale), "16,15");
        assert_eq!(format_money(-0.001, &locale), "0,00");
        assert_eq!(format_money(f64::NAN, &locale), "N/A");
    }

    #[test]
    fn display_sold_passes_text_through() {
        let locale = Locale::default();
        assert_eq!(display_sold("", &locale), "N/A");
        assert_eq!(display_sold("N/A", &locale), "N/A");
        assert_eq!(display_sold("2500", &locale), "2.500");
        assert_eq!(display_sold("+1,2mil vendidos", &locale), "+1,2mil vendidos");
        assert_eq!(display_sold("muitos", &locale), "muitos");
    }

    #[test]
    fn price_strings_round_trip_through_format() {
        let locale = Locale::default();
        for s in ["0,99", "10,00", "999,90", "1.000,00", "12.345,67", "1.234.567,89"] {
            let parsed = parse_price(&text(s), &locale);
            assert_eq!(format_price(parsed, &locale), s);
        }
    }

    #[test]
    fn normalize_keeps_raw_strings_for_display() {
        let locale = Locale::default();
        let raw = RawListing {
            id: "MLB1".to_string(),
            title: "  Lâmpada LED 9W  ".to_string(),
            price: text("19,90"),
            sold: "+500 vendidos".to_string(),
            condition: Condition::New,
            free_shipping: true,
            fulfillment: false,
            permalink: "https://example.com/MLB1".to_string(),
            created: DetailField::NotRequested,
            thumbnail: None,
            page: 1,
        };
        let listing = normalize(raw, &locale);
        assert_eq!(listing.title, "Lâmpada LED 9W");
        assert_eq!(listing.price, Some(19.9));
        assert_eq!(listing.raw_price, "19,90");
        assert_eq!(listing.sold, 500);
        assert_eq!(listing.raw_sold, "+500 vendidos");
    }
}
