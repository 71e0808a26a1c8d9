//! Money helpers using decimal arithmetic.
//!
//! The backend serializes amounts either as JSON strings (`"19.99"`) or as
//! numbers. `rust_decimal::Decimal` accepts both, so amounts are carried as
//! plain `Decimal` values in dollars. The store has a single currency.

use rust_decimal::Decimal;

/// The zero amount.
#[must_use]
pub const fn zero() -> Decimal {
    Decimal::ZERO
}

/// Format an amount for display (e.g., `$19.99`).
#[must_use]
pub fn format_money(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(Decimal::from(20)), "$20.00");
        assert_eq!(format_money(Decimal::from_str("19.999").unwrap()), "$20.00");
        assert_eq!(format_money(zero()), "$0.00");
    }

    #[test]
    fn test_decimal_accepts_string_and_number() {
        let from_str: Decimal = serde_json::from_str("\"10.50\"").unwrap();
        let from_num: Decimal = serde_json::from_str("10.5").unwrap();
        assert_eq!(from_str, from_num);
    }
}
