//! Boundary parsing and constants for the engine's fixed-precision numbers.
//!
//! All quantities are [`rust_decimal::Decimal`]: exact addition, subtraction,
//! multiplication and a total order, with no binary floating-point anywhere in
//! a comparison or a persisted field. Prices carry at most [`PRICE_SCALE`]
//! fractional digits, sizes at most [`SIZE_SCALE`].

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

/// Maximum fractional digits accepted for a price.
pub const PRICE_SCALE: u32 = 4;

/// Maximum fractional digits accepted for a size.
pub const SIZE_SCALE: u32 = 6;

/// Published price for a side whose book is empty.
pub const MIDPOINT: Decimal = dec!(0.5);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecimalError {
    #[error("`{0}` is not a decimal number")]
    Unparseable(String),
    #[error("price {0} is outside [0, 1]")]
    PriceOutOfRange(Decimal),
    #[error("price {0} has more than {PRICE_SCALE} fractional digits")]
    PriceTooPrecise(Decimal),
    #[error("size {0} must be > 0")]
    NonPositiveSize(Decimal),
    #[error("size {0} has more than {SIZE_SCALE} fractional digits")]
    SizeTooPrecise(Decimal),
}

fn parse(raw: &str) -> Result<Decimal, DecimalError> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|_| DecimalError::Unparseable(raw.to_string()))
}

/// Parses a price string: a decimal in `[0, 1]` with at most
/// [`PRICE_SCALE`] fractional digits.
pub fn parse_price(raw: &str) -> Result<Decimal, DecimalError> {
    let price = parse(raw)?;
    if price < Decimal::ZERO || price > Decimal::ONE {
        return Err(DecimalError::PriceOutOfRange(price));
    }
    if price.normalize().scale() > PRICE_SCALE {
        return Err(DecimalError::PriceTooPrecise(price));
    }
    Ok(price)
}

/// Parses a size string: a strictly positive decimal with at most
/// [`SIZE_SCALE`] fractional digits.
pub fn parse_size(raw: &str) -> Result<Decimal, DecimalError> {
    let size = parse(raw)?;
    if size <= Decimal::ZERO {
        return Err(DecimalError::NonPositiveSize(size));
    }
    if size.normalize().scale() > SIZE_SCALE {
        return Err(DecimalError::SizeTooPrecise(size));
    }
    Ok(size)
}
