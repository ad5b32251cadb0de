//! Text normalization and pt-BR number formatting shared by every page.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercases and strips accents, so `"São Paulo"` becomes `"sao paulo"`.
pub fn normalize(value: &str) -> String {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Accent/case-insensitive containment over any of the given fields.
///
/// An empty (or blank) term matches everything.
pub fn matches_search<'a, I>(fields: I, term: &str) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let needle = normalize(term);
    if needle.is_empty() {
        return true;
    }
    fields
        .into_iter()
        .any(|field| normalize(field).contains(&needle))
}

/// Formats a value as Brazilian currency: `R$ 1.234,56`.
///
/// Missing and non-finite values format as zero.
pub fn format_currency(value: Option<f64>) -> String {
    let value = value.filter(|v| v.is_finite()).unwrap_or(0.0);
    let cents = (value.abs() * 100.0).round() as u64;
    let negative = value < 0.0 && cents > 0;

    let units = cents / 100;
    let fraction = cents % 100;

    let digits = units.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!(
        "{}R$ {},{:02}",
        if negative { "-" } else { "" },
        grouped,
        fraction
    )
}

/// `round(part / whole * 100)`, or 0 when there is no goal.
pub fn percent_of(part: f64, whole: f64) -> i64 {
    if !part.is_finite() || !whole.is_finite() || whole <= 0.0 {
        return 0;
    }
    (part / whole * 100.0).round() as i64
}

pub fn format_percent(percent: i64) -> String {
    format!("{}%", percent)
}
