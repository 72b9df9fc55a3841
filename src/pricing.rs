//! Pure money math for line items and quote aggregates.
//!
//! Amounts are rounded to 2 decimal places per line, half up. Aggregates sum
//! the already-rounded per-line values and are never re-rounded: the totals
//! on the quote must equal, cent for cent, the sum of the lines the client
//! sees on the document.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Rounds a monetary amount to 2 decimal places, half up.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Derived amounts for a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAmounts {
    pub line_total_ht: Decimal,
    pub line_tax_amount: Decimal,
    pub line_total_ttc: Decimal,
}

/// Computes the amounts for one line.
///
/// `line_total_ht` and `line_tax_amount` are each rounded to 2 decimals;
/// `line_total_ttc` is their exact sum, so
/// `line_total_ttc == line_total_ht + line_tax_amount` holds by
/// construction.
///
/// # Errors
///
/// `InvalidLineItem` when `quantity <= 0`, `unit_price_ht < 0`, or
/// `tax_rate` is outside `[0, 100]`.
pub fn line_amounts(
    quantity: Decimal,
    unit_price_ht: Decimal,
    tax_rate: Decimal,
) -> Result<LineAmounts, ServiceError> {
    if quantity <= Decimal::ZERO {
        return Err(ServiceError::InvalidLineItem(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    if unit_price_ht < Decimal::ZERO {
        return Err(ServiceError::InvalidLineItem(format!(
            "unit price must not be negative, got {unit_price_ht}"
        )));
    }
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE_HUNDRED {
        return Err(ServiceError::InvalidLineItem(format!(
            "tax rate must be between 0 and 100, got {tax_rate}"
        )));
    }

    let line_total_ht = round2(quantity * unit_price_ht);
    let line_tax_amount = round2(line_total_ht * tax_rate / Decimal::ONE_HUNDRED);
    let line_total_ttc = line_total_ht + line_tax_amount;

    Ok(LineAmounts {
        line_total_ht,
        line_tax_amount,
        line_total_ttc,
    })
}

/// Aggregate totals of a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub subtotal_ht: Decimal,
    pub total_tax: Decimal,
    pub total_ttc: Decimal,
}

/// Sums already-rounded line amounts into quote totals.
///
/// Summing rounded values (instead of re-rounding a raw running sum) keeps
/// the totals consistent with the printed lines and free of cumulative
/// drift. `total_ttc == subtotal_ht + total_tax` holds by construction.
pub fn quote_totals(lines: impl IntoIterator<Item = LineAmounts>) -> QuoteTotals {
    let mut subtotal_ht = Decimal::ZERO;
    let mut total_tax = Decimal::ZERO;

    for line in lines {
        subtotal_ht += line.line_total_ht;
        total_tax += line.line_tax_amount;
    }

    QuoteTotals {
        subtotal_ht,
        total_tax,
        total_ttc: subtotal_ht + total_tax,
    }
}
