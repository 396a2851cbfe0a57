//! Share of token supply moved by a proposal, in basis points.

use dropgate_core::Amount;
use primitive_types::U512;

/// One hundred percent in basis points.
pub const BASIS_POINTS: u64 = 10_000;

/// `amount * 10000 / supply`, rounded down. `None` when `supply` is zero.
pub fn supply_basis_points(amount: Amount, supply: Amount) -> Option<Amount> {
    if supply.is_zero() {
        return None;
    }
    let scaled = amount.full_mul(Amount::from(BASIS_POINTS)) / U512::from(supply);
    Amount::try_from(scaled).ok()
}

/// Render basis points as a percentage with two decimals.
pub fn format_basis_points(bps: Amount) -> String {
    let hundred = Amount::from(100u64);
    let whole = bps / hundred;
    let fraction = (bps % hundred).low_u64();
    format!("{whole}.{fraction:02}%")
}

/// Percentage of `supply` that `amount` represents, e.g. `"5.00%"`.
pub fn supply_share(amount: Amount, supply: Amount) -> Option<String> {
    supply_basis_points(amount, supply).map(format_basis_points)
}
