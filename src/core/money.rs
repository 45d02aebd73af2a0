use rust_decimal::{Decimal, RoundingStrategy};

use crate::core::{AppError, Result};

/// Fractional digits kept on every persisted monetary field
pub const CURRENCY_SCALE: u32 = 2;

/// Fractional digits accepted on a tax rate (e.g. 0.0825)
pub const TAX_RATE_SCALE: u32 = 4;

/// Fractional digits accepted on a line item quantity (e.g. 1.5 hours)
pub const QUANTITY_SCALE: u32 = 4;

/// Integer digits that fit the DECIMAL(19, 2) monetary columns
pub const AMOUNT_INTEGER_DIGITS: u32 = 17;

/// Integer digits that fit the DECIMAL(15, 4) quantity column
pub const QUANTITY_INTEGER_DIGITS: u32 = 11;

/// Rounds a value to currency precision, half-up (midpoint away from zero).
///
/// The result always carries exactly two fractional digits so persisted
/// amounts render as `110.00` rather than `110`.
pub fn round_currency(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(CURRENCY_SCALE);
    rounded
}

/// Line total: quantity × unit price at full precision, rounded once at the end
pub fn line_total(quantity: Decimal, unit_price: Decimal) -> Result<Decimal> {
    let product = quantity.checked_mul(unit_price).ok_or_else(|| {
        AppError::invariant(format!(
            "line total overflowed: {} × {}",
            quantity, unit_price
        ))
    })?;

    Ok(round_currency(product))
}

/// Sums already-rounded amounts and normalises the result to currency precision
pub fn sum_currency<I>(amounts: I) -> Result<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    let sum = amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
        .ok_or_else(|| AppError::invariant("currency sum overflowed"))?;

    Ok(round_currency(sum))
}

/// Rejects amounts whose integer part does not fit the monetary columns
pub fn ensure_storable(field: &str, amount: Decimal) -> Result<()> {
    if !fits_integer_digits(amount, AMOUNT_INTEGER_DIGITS) {
        return Err(AppError::validation(format!(
            "{} {} exceeds {} integer digits",
            field, amount, AMOUNT_INTEGER_DIGITS
        )));
    }

    Ok(())
}

/// Quantity must be strictly positive
pub fn validate_quantity(quantity: Decimal) -> Result<()> {
    if quantity <= Decimal::ZERO {
        return Err(AppError::validation(format!(
            "Quantity must be positive, got: {}",
            quantity
        )));
    }

    if quantity.normalize().scale() > QUANTITY_SCALE {
        return Err(AppError::validation(format!(
            "Quantity cannot have more than {} decimal places",
            QUANTITY_SCALE
        )));
    }

    if !fits_integer_digits(quantity, QUANTITY_INTEGER_DIGITS) {
        return Err(AppError::validation(format!(
            "Quantity cannot exceed {} integer digits",
            QUANTITY_INTEGER_DIGITS
        )));
    }

    Ok(())
}

/// Unit price must be non-negative with at most currency precision
pub fn validate_unit_price(unit_price: Decimal) -> Result<()> {
    if unit_price < Decimal::ZERO {
        return Err(AppError::validation(format!(
            "Unit price must be non-negative, got: {}",
            unit_price
        )));
    }

    validate_currency_scale("Unit price", unit_price)?;
    ensure_storable("Unit price", unit_price)
}

/// Payment amounts must be strictly positive with at most currency precision
pub fn validate_payment_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::validation(format!(
            "Payment amount must be positive, got: {}",
            amount
        )));
    }

    validate_currency_scale("Payment amount", amount)?;
    ensure_storable("Payment amount", amount)
}

/// Tax rate is a fraction in `[0, 1]` with at most four decimal places
pub fn validate_tax_rate(tax_rate: Decimal) -> Result<()> {
    if tax_rate < Decimal::ZERO {
        return Err(AppError::validation("Tax rate cannot be negative"));
    }

    if tax_rate > Decimal::ONE {
        return Err(AppError::validation("Tax rate cannot exceed 1.0 (100%)"));
    }

    if tax_rate.normalize().scale() > TAX_RATE_SCALE {
        return Err(AppError::validation(format!(
            "Tax rate cannot have more than {} decimal places",
            TAX_RATE_SCALE
        )));
    }

    Ok(())
}

fn validate_currency_scale(field: &str, amount: Decimal) -> Result<()> {
    if amount.normalize().scale() > CURRENCY_SCALE {
        return Err(AppError::validation(format!(
            "{} cannot have more than {} decimal places",
            field, CURRENCY_SCALE
        )));
    }

    Ok(())
}

fn fits_integer_digits(value: Decimal, digits: u32) -> bool {
    value.abs() < Decimal::from(10i64.pow(digits))
}
