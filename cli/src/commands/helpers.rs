use anyhow::{Context, Result, bail};
use serde::Serialize;

use crumb_core::models::convert_to_grams;

/// Parse a purchase/quantity string into `(grams, unit_label)`.
/// Accepts: "500", "500g", "1kg", "1.5 kg", "1 lb", "250 ml", etc.
pub(crate) fn parse_quantity(s: &str) -> Result<(f64, String)> {
    let s = s.trim();

    // Plain grams first: "500" or "500g"
    if let Ok(g) = parse_grams(s) {
        return Ok((g, "g".to_string()));
    }

    // "N<unit>" with no space (e.g. "1kg", "2tbsp")
    if let Some((qty, unit)) = split_number_unit(s) {
        return convert(qty, unit, s);
    }

    // "<number> <unit>"
    let parts: Vec<&str> = s.splitn(2, char::is_whitespace).collect();
    if parts.len() == 2 {
        let qty: f64 = parts[0]
            .parse()
            .with_context(|| format!("Invalid quantity: '{s}'"))?;
        return convert(qty, parts[1].trim(), s);
    }

    bail!("Invalid quantity format: '{s}'. Use '500g', '1kg', '1.5 lb', etc.")
}

fn convert(qty: f64, unit: &str, original: &str) -> Result<(f64, String)> {
    if qty <= 0.0 {
        bail!("Quantity must be greater than 0");
    }
    let Some((grams, is_approx)) = convert_to_grams(qty, unit) else {
        bail!("Unknown unit '{unit}' in '{original}'. Supported: g, kg, lb, oz, tbsp, tsp, ml, l");
    };
    if is_approx {
        eprintln!("Note: {qty} {unit} ≈ {grams:.0}g (approximate, assumes water density)");
    }
    Ok((grams, unit.to_lowercase()))
}

/// Split "1kg" or "2.5tbsp" into (1.0, "kg") or (2.5, "tbsp").
fn split_number_unit(s: &str) -> Option<(f64, &str)> {
    let idx = s.find(|c: char| c.is_alphabetic())?;
    if idx == 0 {
        return None;
    }
    let (num_part, unit_part) = s.split_at(idx);
    let qty: f64 = num_part.parse().ok()?;
    if unit_part.is_empty() {
        return None;
    }
    Some((qty, unit_part))
}

pub(crate) fn parse_grams(s: &str) -> Result<f64> {
    let trimmed = s.trim_end_matches('g').trim();
    let value: f64 = trimmed
        .parse()
        .with_context(|| format!("Invalid quantity: '{s}'. Use a number like '500' or '500g'"))?;
    if value <= 0.0 {
        bail!("Quantity must be greater than 0");
    }
    Ok(value)
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn format_money(v: f64) -> String {
    format!("{v:.2}")
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grams() {
        assert!((parse_grams("500").unwrap() - 500.0).abs() < f64::EPSILON);
        assert!((parse_grams("500g").unwrap() - 500.0).abs() < f64::EPSILON);
        assert!(parse_grams("0").is_err());
        assert!(parse_grams("abc").is_err());
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("1kg").unwrap(), (1000.0, "kg".to_string()));
        assert_eq!(parse_quantity("1.5 kg").unwrap(), (1500.0, "kg".to_string()));
        assert_eq!(parse_quantity("500").unwrap(), (500.0, "g".to_string()));
        assert!(parse_quantity("1 cup").is_err());
        assert!(parse_quantity("-1kg").is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a rather long name", 10), "a rathe...");
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("nope"), "{\"error\":\"nope\"}");
    }
}
