//! Moving-average stock valuation
//!
//! Running aggregates of a stock ledger entry depend only on the entries
//! before it on the same item+warehouse timeline, so a timeline is revalued
//! with a single in-order scan.

use rust_decimal::Decimal;

use crate::error::RecordError;
use crate::models::{LedgerMovement, RunningValuation};

/// Decimal places kept on valuation rates
pub const RATE_PRECISION: u32 = 9;

/// Cumulative state of a moving-average scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovingAverage {
    qty: Decimal,
    value: Decimal,
}

impl MovingAverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn qty(&self) -> Decimal {
        self.qty
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Current valuation rate: cumulative value over cumulative quantity,
    /// zero while nothing is on hand.
    pub fn rate(&self) -> Result<Decimal, RecordError> {
        if self.qty.is_zero() {
            return Ok(Decimal::ZERO);
        }
        self.value
            .checked_div(self.qty)
            .map(|rate| rate.round_dp(RATE_PRECISION))
            .ok_or(RecordError::Overflow {
                field: "valuation_rate",
            })
    }

    /// Fold one movement into the running state and return the aggregates
    /// the entry should carry.
    ///
    /// Values are rounded to [`RATE_PRECISION`] places, the scale the ledger
    /// stores them at. The state is left untouched when the movement would
    /// overflow.
    pub fn apply(&mut self, movement: &LedgerMovement) -> Result<RunningValuation, RecordError> {
        let value_before = self.value;

        let qty = self
            .qty
            .checked_add(movement.actual_qty)
            .ok_or(RecordError::Overflow {
                field: "qty_after_transaction",
            })?;
        let value = movement
            .actual_qty
            .checked_mul(movement.incoming_rate)
            .and_then(|incoming| value_before.checked_add(incoming))
            .ok_or(RecordError::Overflow { field: "stock_value" })?;

        let next = MovingAverage { qty, value };
        let valuation_rate = next.rate()?;
        let stock_value = qty
            .checked_mul(valuation_rate)
            .map(|v| v.round_dp(RATE_PRECISION))
            .ok_or(RecordError::Overflow { field: "stock_value" })?;
        let stock_value_difference = stock_value
            .checked_sub(value_before)
            .map(|v| v.round_dp(RATE_PRECISION))
            .ok_or(RecordError::Overflow {
                field: "stock_value_difference",
            })?;

        *self = next;

        Ok(RunningValuation {
            name: movement.name.clone(),
            qty_after_transaction: qty,
            valuation_rate,
            stock_value,
            stock_value_difference,
        })
    }
}

/// Sort a timeline into ledger order: posting date, posting time, then name.
pub fn sort_timeline(movements: &mut [LedgerMovement]) {
    movements.sort_by(|a, b| a.posting.cmp(&b.posting).then_with(|| a.name.cmp(&b.name)));
}

/// Revalue one item+warehouse timeline.
///
/// The input is sorted first, so callers may pass rows in any order. The
/// output has one entry per movement, in ledger order. Fails on the first
/// entry whose aggregates do not fit a decimal.
pub fn revalue_timeline(
    mut movements: Vec<LedgerMovement>,
) -> Result<Vec<RunningValuation>, RecordError> {
    sort_timeline(&mut movements);

    let mut state = MovingAverage::new();
    movements.iter().map(|m| state.apply(m)).collect()
}
