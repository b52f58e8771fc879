use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places every currency value carries.
pub const CURRENCY_SCALE: u32 = 2;

/// Rounds a currency value to cents, half away from zero.
///
/// Amounts in this crate are never negative, so this is round-half-up: the
/// same rounding the borrower sees on the signed document.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Formats a currency value as `$1,234.56`.
pub fn format_currency(value: Decimal) -> String {
    let rounded = round_currency(value);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let plain = format!("{:.2}", rounded.abs());
    let (whole, cents) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{sign}${grouped}.{cents}")
}

/// Formats a plain amount with two decimals and no symbol (`1234.56`).
pub fn format_amount(value: Decimal) -> String {
    format!("{:.2}", round_currency(value))
}

/// Formats a percentage value (`9.99` -> `9.99%`).
pub fn format_percent(value: Decimal) -> String {
    format!("{:.2}%", value)
}
