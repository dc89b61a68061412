use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use rust_decimal::Decimal;

/// Decimal places kept by the `NUMERIC(14, 2)` money columns.
pub const MONEY_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidAmount {
    #[error("amount must be positive, got {0}")]
    NotPositive(Decimal),
    #[error("amount {0} has more than {scale} decimal places", scale = MONEY_SCALE)]
    TooPrecise(Decimal),
    #[error("amount {0} exceeds the maximum of {max}", max = max_amount())]
    TooLarge(Decimal),
}

/// Largest amount a money column can hold: 999999999999.99.
pub fn max_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, MONEY_SCALE)
}

/// Accepts a positive amount that both backends store without rounding.
pub fn check_amount(amount: Decimal) -> Result<Decimal, InvalidAmount> {
    if amount <= Decimal::ZERO {
        return Err(InvalidAmount::NotPositive(amount));
    }
    if amount > max_amount() {
        return Err(InvalidAmount::TooLarge(amount));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(InvalidAmount::TooPrecise(amount));
    }
    Ok(amount)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid currency code '{0}': expected three upper-case letters")]
pub struct InvalidCurrency(pub String);

/// ISO-4217 style currency code, e.g. `EUR`.
///
/// Totals are never combined across two different codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl AsRef<str>) -> Result<Self, InvalidCurrency> {
        let code = code.as_ref();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
            Ok(Self(code.to_string()))
        } else {
            Err(InvalidCurrency(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = InvalidCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = InvalidCurrency;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// `|a - b| <= epsilon`; a zero epsilon is exact equality.
pub fn amounts_match(a: Decimal, b: Decimal, epsilon: Decimal) -> bool {
    (a - b).abs() <= epsilon.abs()
}
