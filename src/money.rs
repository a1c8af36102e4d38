//! Currency math over exact decimals.
//!
//! Prices are stored as integer minor units (cents); every externally
//! visible figure passes through [`round2`] so intermediate precision
//! never leaks into stored or displayed amounts.

use rust_decimal::{Decimal, RoundingStrategy};

/// Convert integer cents to a USD amount
pub fn cents_to_usd(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Round to 2 decimal places, half-up
pub fn round2(x: Decimal) -> Decimal {
    x.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Total in USD for `quantity` tickets at `ticket_price_cents` each
pub fn total_usd(ticket_price_cents: i64, quantity: i64) -> Decimal {
    round2(cents_to_usd(ticket_price_cents) * Decimal::from(quantity))
}

/// Convert a USD amount to local currency at `rate`
pub fn to_local(usd: Decimal, rate: Decimal) -> Decimal {
    round2(usd * rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cents_to_usd() {
        assert_eq!(cents_to_usd(1000), Decimal::new(1000, 2));
        assert_eq!(cents_to_usd(1000).to_string(), "10.00");
        assert_eq!(cents_to_usd(99).to_string(), "0.99");
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(Decimal::new(2345, 3)).to_string(), "2.35"); // 2.345
        assert_eq!(round2(Decimal::new(2344, 3)).to_string(), "2.34"); // 2.344
        assert_eq!(round2(Decimal::new(100, 2)).to_string(), "1.00");
    }

    #[test]
    fn test_total_usd() {
        // 3 tickets at 10.00 each
        assert_eq!(total_usd(1000, 3).to_string(), "30.00");
    }

    #[test]
    fn test_to_local() {
        let total = total_usd(1000, 3); // 30.00 USD
        let rate = Decimal::new(400, 1); // 40.0
        assert_eq!(to_local(total, rate).to_string(), "1200.00");
    }
}
