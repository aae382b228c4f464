use rust_decimal::Decimal;

/// All monetary figures in the system are carried at two decimal places.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp(2)
}

/// Minutes worked expressed as decimal hours, rounded to two places.
pub fn minutes_to_hours(minutes: i64) -> Decimal {
    round2(Decimal::from(minutes) / Decimal::from(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn rounds_to_cents() {
        let v = Decimal::from_str("1234.5678").unwrap();
        assert_eq!(round2(v), Decimal::from_str("1234.57").unwrap());
    }

    #[test]
    fn converts_minutes() {
        assert_eq!(minutes_to_hours(480), Decimal::from_str("8.00").unwrap());
        assert_eq!(minutes_to_hours(510), Decimal::from_str("8.50").unwrap());
        assert_eq!(minutes_to_hours(200), Decimal::from_str("3.33").unwrap());
    }
}
