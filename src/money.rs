//! Helpers for storing fixed-point money amounts in SQLite.
//!
//! Amounts are stored as TEXT so that no precision is lost to SQLite's floating point
//! REAL type. Sums are computed in Rust with [Decimal].

use rusqlite::{Row, types::Type};
use rust_decimal::{Decimal, prelude::ToPrimitive};

/// Read the decimal stored as text in column `index`.
pub(crate) fn decimal_column(row: &Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let raw: String = row.get(index)?;

    parse_decimal(&raw, index)
}

/// Read the optional decimal stored as text in column `index`.
pub(crate) fn optional_decimal_column(
    row: &Row,
    index: usize,
) -> Result<Option<Decimal>, rusqlite::Error> {
    let raw: Option<String> = row.get(index)?;

    raw.map(|raw| parse_decimal(&raw, index)).transpose()
}

fn parse_decimal(raw: &str, index: usize) -> Result<Decimal, rusqlite::Error> {
    raw.parse::<Decimal>()
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
        })
}

/// The largest amount of money accepted from clients, 999,999,999,999.99.
pub(crate) const MAX_AMOUNT: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// The number of decimal places accepted for amounts of money.
pub(crate) const MONEY_SCALE: u32 = 2;

/// Add up `amounts`, saturating at the limits of [Decimal].
pub(crate) fn sum_amounts(amounts: impl IntoIterator<Item = Decimal>) -> Decimal {
    amounts
        .into_iter()
        .fold(Decimal::ZERO, |total, amount| total.saturating_add(amount))
}

/// `numerator / denominator`, saturating at the limits of [Decimal].
///
/// Zero when `denominator` is zero.
pub(crate) fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }

    numerator.checked_div(denominator).unwrap_or_else(|| {
        if numerator.is_sign_negative() == denominator.is_sign_negative() {
            Decimal::MAX
        } else {
            Decimal::MIN
        }
    })
}

/// `numerator` as a percentage of `denominator`, saturating at the limits of [Decimal].
pub(crate) fn percentage(numerator: Decimal, denominator: Decimal) -> Decimal {
    ratio(numerator, denominator).saturating_mul(Decimal::ONE_HUNDRED)
}

/// Convert a decimal ratio into a float for percentages and scores.
pub(crate) fn as_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Round `value` to two decimal places.
pub(crate) fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use rust_decimal::Decimal;

    use super::{
        MAX_AMOUNT, decimal_column, optional_decimal_column, percentage, ratio, round_2dp,
        sum_amounts,
    };

    #[test]
    fn reads_decimals_without_losing_precision() {
        let connection = Connection::open_in_memory().unwrap();

        let (amount, missing) = connection
            .query_row("SELECT '1234.56', NULL", [], |row| {
                Ok((decimal_column(row, 0)?, optional_decimal_column(row, 1)?))
            })
            .unwrap();

        assert_eq!(amount, Decimal::new(123456, 2));
        assert_eq!(missing, None);
    }

    #[test]
    fn rejects_text_that_is_not_a_number() {
        let connection = Connection::open_in_memory().unwrap();

        let result = connection.query_row("SELECT 'abc'", [], |row| decimal_column(row, 0));

        assert!(result.is_err());
    }

    #[test]
    fn rounds_to_two_decimal_places() {
        assert_eq!(round_2dp(33.333333), 33.33);
        assert_eq!(round_2dp(66.666666), 66.67);
    }

    #[test]
    fn max_amount_is_a_trillion_less_a_cent() {
        assert_eq!(MAX_AMOUNT, "999999999999.99".parse::<Decimal>().unwrap());
    }

    #[test]
    fn sums_saturate_instead_of_overflowing() {
        assert_eq!(sum_amounts([Decimal::MAX, Decimal::ONE]), Decimal::MAX);
        assert_eq!(
            sum_amounts([Decimal::new(150, 2), Decimal::new(250, 2)]),
            Decimal::new(4, 0)
        );
    }

    #[test]
    fn ratio_of_tiny_denominator_saturates() {
        let tiny = Decimal::new(1, 28);

        assert_eq!(ratio(Decimal::TEN, tiny), Decimal::MAX);
        assert_eq!(ratio(-Decimal::TEN, tiny), Decimal::MIN);
        assert_eq!(percentage(Decimal::TEN, tiny), Decimal::MAX);
        assert_eq!(ratio(Decimal::TEN, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn percentage_of_ordinary_amounts() {
        assert_eq!(
            percentage(Decimal::new(50, 0), Decimal::new(200, 0)),
            Decimal::new(25, 0)
        );
    }
}
