//! Number formatting for cost output.

/// Amount with currency, two decimals. `USD` is shown as `$`.
#[must_use]
pub fn format_amount(value: f64, currency: Option<&str>) -> String {
    match currency {
        None | Some("USD") => {
            if value < 0.0 {
                format!("-${:.2}", value.abs())
            } else {
                format!("${value:.2}")
            }
        }
        Some(code) => format!("{value:.2} {code}"),
    }
}

/// Ratio as a signed percentage (`0.125` → `+12.5%`).
#[must_use]
pub fn format_change(ratio: f64) -> String {
    format!("{:+.1}%", ratio * 100.0)
}

/// Ratio as an unsigned percentage (`0.05` → `5%`).
#[must_use]
pub fn format_ratio(ratio: f64) -> String {
    let percent = ratio * 100.0;
    if (percent - percent.round()).abs() < 1e-9 {
        format!("{percent:.0}%")
    } else {
        format!("{percent:.1}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_uses_dollar_sign() {
        assert_eq!(format_amount(12.345, Some("USD")), "$12.35");
        assert_eq!(format_amount(-3.0, None), "-$3.00");
    }

    #[test]
    fn other_currencies_use_code() {
        assert_eq!(format_amount(7.5, Some("EUR")), "7.50 EUR");
    }

    #[test]
    fn change_is_signed() {
        assert_eq!(format_change(0.125), "+12.5%");
        assert_eq!(format_change(-0.5), "-50.0%");
        assert_eq!(format_change(0.0), "+0.0%");
    }

    #[test]
    fn ratio_drops_trailing_zero() {
        assert_eq!(format_ratio(0.05), "5%");
        assert_eq!(format_ratio(0.125), "12.5%");
    }
}
