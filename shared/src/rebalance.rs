//! GL rebalancing planner
//!
//! Moving an item from asset to stock bookkeeping means posting its amount to
//! the stock accounts and taking the same amount back out of the asset
//! accounts on every voucher that carried it. The planner works on an
//! in-memory view of a voucher's legs and emits a change set whose debits and
//! credits cancel out, so the voucher stays balanced whatever it looked like
//! before.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RebalanceError;
use crate::models::{GlLeg, LegAmounts, LineAmount, NewGlEntry, VoucherContext};

/// Account names the corrections post to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerAccounts {
    pub stock_in_hand: String,
    pub stock_received_not_billed: String,
    pub asset_received_not_billed: String,
}

impl Default for LedgerAccounts {
    fn default() -> Self {
        Self {
            stock_in_hand: "Stock In Hand - AOGC".to_string(),
            stock_received_not_billed: "Stock Received But Not Billed - AOGC".to_string(),
            asset_received_not_billed: "Asset Received But Not Billed - AOGC".to_string(),
        }
    }
}

impl LedgerAccounts {
    /// `against` label written on every leg of a corrected invoice
    pub fn invoice_against_label(&self) -> String {
        format!(
            "{},{}",
            self.asset_received_not_billed, self.stock_received_not_billed
        )
    }
}

/// One change to a voucher's GL legs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GlChange {
    Insert { entry: NewGlEntry },
    /// Add signed deltas to an existing leg
    Adjust {
        leg: String,
        debit: LegAmounts,
        credit: LegAmounts,
    },
    /// Overwrite the `against` label on every leg of the voucher
    SetAgainst { against: String },
}

impl GlChange {
    /// Company-currency debit minus credit this change adds to the voucher
    pub fn imbalance(&self) -> Decimal {
        match self {
            GlChange::Insert { entry } => entry.debit.company - entry.credit.company,
            GlChange::Adjust { debit, credit, .. } => debit.company - credit.company,
            GlChange::SetAgainst { .. } => Decimal::ZERO,
        }
    }
}

fn first_leg<'a>(legs: &'a [GlLeg], pred: impl Fn(&GlLeg) -> bool) -> Option<&'a GlLeg> {
    legs.iter().find(|leg| pred(leg))
}

fn ensure_balanced(voucher_no: &str, changes: &[GlChange]) -> Result<(), RebalanceError> {
    let difference: Decimal = changes.iter().map(GlChange::imbalance).sum();
    if difference.is_zero() {
        Ok(())
    } else {
        Err(RebalanceError::UnbalancedChange {
            voucher_no: voucher_no.to_string(),
            difference,
        })
    }
}

/// Plan the changes for one purchase receipt line.
///
/// Stock In Hand is debited and Stock Received But Not Billed credited with
/// the line amount, creating either leg when the voucher lacks it. A negative
/// line (a return) creates those legs on the opposite side. The asset
/// account debit and the Asset Received But Not Billed credit that mirror each
/// other are reduced by the same amount. A voucher carrying only one of those
/// two asset legs cannot be corrected.
pub fn plan_receipt_line(
    ctx: &VoucherContext,
    legs: &[GlLeg],
    amount: &LineAmount,
    accounts: &LedgerAccounts,
    asset_account: &str,
) -> Result<Vec<GlChange>, RebalanceError> {
    let delta = LegAmounts::from_line(amount);
    if delta.is_zero() {
        return Ok(Vec::new());
    }

    let mut changes = Vec::with_capacity(4);

    match first_leg(legs, |l| l.account == accounts.stock_in_hand) {
        Some(leg) => changes.push(GlChange::Adjust {
            leg: leg.name.clone(),
            debit: delta,
            credit: LegAmounts::ZERO,
        }),
        None => changes.push(GlChange::Insert {
            entry: NewGlEntry::signed_debit(
                ctx,
                &accounts.stock_in_hand,
                &accounts.stock_received_not_billed,
                delta,
            )?,
        }),
    }

    match first_leg(legs, |l| l.account == accounts.stock_received_not_billed) {
        Some(leg) => changes.push(GlChange::Adjust {
            leg: leg.name.clone(),
            debit: LegAmounts::ZERO,
            credit: delta,
        }),
        None => changes.push(GlChange::Insert {
            entry: NewGlEntry::signed_credit(
                ctx,
                &accounts.stock_received_not_billed,
                &accounts.stock_in_hand,
                delta,
            )?,
        }),
    }

    let asset_debit = first_leg(legs, |l| {
        l.account == asset_account && l.is_against(&accounts.asset_received_not_billed)
    });
    let asset_credit = first_leg(legs, |l| {
        l.account == accounts.asset_received_not_billed && l.is_against(asset_account)
    });

    match (asset_debit, asset_credit) {
        (Some(debit_leg), Some(credit_leg)) => {
            changes.push(GlChange::Adjust {
                leg: debit_leg.name.clone(),
                debit: -delta,
                credit: LegAmounts::ZERO,
            });
            changes.push(GlChange::Adjust {
                leg: credit_leg.name.clone(),
                debit: LegAmounts::ZERO,
                credit: -delta,
            });
        }
        (None, None) => {}
        (Some(_), None) => {
            return Err(RebalanceError::IncompleteAssetPosting {
                voucher_no: ctx.voucher_no.clone(),
                present: asset_account.to_string(),
            })
        }
        (None, Some(_)) => {
            return Err(RebalanceError::IncompleteAssetPosting {
                voucher_no: ctx.voucher_no.clone(),
                present: accounts.asset_received_not_billed.clone(),
            })
        }
    }

    ensure_balanced(&ctx.voucher_no, &changes)?;
    Ok(changes)
}

/// Plan the changes for one purchase invoice line.
///
/// The invoice clears Stock Received But Not Billed instead of Asset Received
/// But Not Billed: the former is debited (created against the supplier when
/// missing) and the latter's debit reduced by the line amount.
pub fn plan_invoice_line(
    ctx: &VoucherContext,
    legs: &[GlLeg],
    amount: &LineAmount,
    accounts: &LedgerAccounts,
) -> Result<Vec<GlChange>, RebalanceError> {
    let delta = LegAmounts::from_line(amount);
    if delta.is_zero() {
        return Ok(Vec::new());
    }

    let asset_leg = first_leg(legs, |l| l.account == accounts.asset_received_not_billed)
        .ok_or_else(|| RebalanceError::MissingAssetLeg {
            voucher_no: ctx.voucher_no.clone(),
            account: accounts.asset_received_not_billed.clone(),
        })?;

    let mut changes = Vec::with_capacity(2);

    match first_leg(legs, |l| l.account == accounts.stock_received_not_billed) {
        Some(leg) => changes.push(GlChange::Adjust {
            leg: leg.name.clone(),
            debit: delta,
            credit: LegAmounts::ZERO,
        }),
        None => changes.push(GlChange::Insert {
            entry: NewGlEntry::signed_debit(
                ctx,
                &accounts.stock_received_not_billed,
                ctx.supplier.as_deref().unwrap_or_default(),
                delta,
            )?,
        }),
    }

    changes.push(GlChange::Adjust {
        leg: asset_leg.name.clone(),
        debit: -delta,
        credit: LegAmounts::ZERO,
    });

    ensure_balanced(&ctx.voucher_no, &changes)?;
    Ok(changes)
}

/// Apply a change to the in-memory view of a voucher.
///
/// `assigned_name` names the leg created by an insert and is ignored otherwise.
pub fn apply_change(legs: &mut Vec<GlLeg>, change: &GlChange, assigned_name: &str) {
    match change {
        GlChange::Insert { entry } => legs.push(GlLeg::from_new(assigned_name, entry)),
        GlChange::Adjust { leg, debit, credit } => {
            if let Some(target) = legs.iter_mut().find(|l| &l.name == leg) {
                target.debit = target.debit + *debit;
                target.credit = target.credit + *credit;
            }
        }
        GlChange::SetAgainst { against } => {
            for leg in legs.iter_mut() {
                leg.against = Some(against.clone());
            }
        }
    }
}

/// Apply a whole change set, naming inserted legs `pending-N`
pub fn apply_changes(legs: &mut Vec<GlLeg>, changes: &[GlChange]) {
    for change in changes {
        let name = format!("pending-{}", legs.len() + 1);
        apply_change(legs, change, &name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VoucherTotals;
    use crate::types::VoucherType;
    use chrono::NaiveDate;

    const ASSET: &str = "Fixed Assets - AOGC";

    fn accounts() -> LedgerAccounts {
        LedgerAccounts::default()
    }

    fn ctx(voucher_type: VoucherType) -> VoucherContext {
        VoucherContext {
            voucher_type,
            voucher_no: "PR-0001".into(),
            posting_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            company: "AOGC".into(),
            currency: "AFN".into(),
            conversion_rate: Decimal::ONE,
            cost_center: None,
            branch: None,
            owner: "admin@example.com".into(),
            fiscal_year: Some("2024".into()),
            supplier: Some("Laptop Supplier".into()),
        }
    }

    fn amt(value: i64) -> LegAmounts {
        LegAmounts {
            company: Decimal::from(value),
            account_currency: Decimal::from(value),
            transaction_currency: Decimal::from(value),
        }
    }

    fn line(value: i64) -> LineAmount {
        LineAmount {
            amount: Decimal::from(value),
            base_amount: Decimal::from(value),
        }
    }

    fn leg(name: &str, account: &str, against: &str, debit: i64, credit: i64) -> GlLeg {
        GlLeg {
            name: name.into(),
            account: account.into(),
            against: Some(against.into()),
            debit: amt(debit),
            credit: amt(credit),
        }
    }

    /// A receipt booked entirely as an asset
    fn asset_receipt(value: i64) -> Vec<GlLeg> {
        let a = accounts();
        vec![
            leg("GLE-1", ASSET, &a.asset_received_not_billed, value, 0),
            leg("GLE-2", &a.asset_received_not_billed, ASSET, 0, value),
        ]
    }

    #[test]
    fn receipt_without_stock_legs_gets_a_new_pair() {
        let legs = asset_receipt(1000);
        let changes = plan_receipt_line(
            &ctx(VoucherType::PurchaseReceipt),
            &legs,
            &line(1000),
            &accounts(),
            ASSET,
        )
        .unwrap();

        let inserts = changes
            .iter()
            .filter(|c| matches!(c, GlChange::Insert { .. }))
            .count();
        assert_eq!(inserts, 2);

        let mut after = legs.clone();
        apply_changes(&mut after, &changes);
        assert!(VoucherTotals::of(&after).is_balanced());

        let asset_leg = after.iter().find(|l| l.name == "GLE-1").unwrap();
        assert_eq!(asset_leg.debit.company, Decimal::ZERO);
        let stock = after
            .iter()
            .find(|l| l.account == accounts().stock_in_hand)
            .unwrap();
        assert_eq!(stock.debit.company, Decimal::from(1000));
        assert!(stock.is_against(&accounts().stock_received_not_billed));
    }

    #[test]
    fn receipt_with_stock_legs_adjusts_them() {
        let a = accounts();
        let mut legs = asset_receipt(300);
        legs.push(leg("GLE-3", &a.stock_in_hand, &a.stock_received_not_billed, 200, 0));
        legs.push(leg("GLE-4", &a.stock_received_not_billed, &a.stock_in_hand, 0, 200));

        let changes = plan_receipt_line(
            &ctx(VoucherType::PurchaseReceipt),
            &legs,
            &line(300),
            &a,
            ASSET,
        )
        .unwrap();
        assert!(changes.iter().all(|c| matches!(c, GlChange::Adjust { .. })));

        apply_changes(&mut legs, &changes);
        let stock = legs.iter().find(|l| l.name == "GLE-3").unwrap();
        assert_eq!(stock.debit.company, Decimal::from(500));
        let srbnb = legs.iter().find(|l| l.name == "GLE-4").unwrap();
        assert_eq!(srbnb.credit.company, Decimal::from(500));
        assert!(VoucherTotals::of(&legs).is_balanced());
    }

    #[test]
    fn return_receipt_without_stock_legs_posts_reversed_pair() {
        let a = accounts();
        let legs = asset_receipt(-200);
        let changes = plan_receipt_line(
            &ctx(VoucherType::PurchaseReceipt),
            &legs,
            &line(-200),
            &a,
            ASSET,
        )
        .unwrap();

        let mut after = legs.clone();
        apply_changes(&mut after, &changes);
        assert!(VoucherTotals::of(&after).is_balanced());

        let stock = after.iter().find(|l| l.account == a.stock_in_hand).unwrap();
        assert!(stock.debit.is_zero());
        assert_eq!(stock.credit.company, Decimal::from(200));
        let srbnb = after
            .iter()
            .find(|l| l.account == a.stock_received_not_billed)
            .unwrap();
        assert_eq!(srbnb.debit.company, Decimal::from(200));
        assert!(srbnb.credit.is_zero());

        let asset_leg = after.iter().find(|l| l.name == "GLE-1").unwrap();
        assert_eq!(asset_leg.debit.company, Decimal::ZERO);
    }

    #[test]
    fn return_receipt_with_stock_legs_reduces_them() {
        let a = accounts();
        let mut legs = asset_receipt(-200);
        legs.push(leg("GLE-3", &a.stock_in_hand, &a.stock_received_not_billed, 500, 0));
        legs.push(leg("GLE-4", &a.stock_received_not_billed, &a.stock_in_hand, 0, 500));

        let changes = plan_receipt_line(
            &ctx(VoucherType::PurchaseReceipt),
            &legs,
            &line(-200),
            &a,
            ASSET,
        )
        .unwrap();
        assert!(changes.iter().all(|c| matches!(c, GlChange::Adjust { .. })));

        apply_changes(&mut legs, &changes);
        let stock = legs.iter().find(|l| l.name == "GLE-3").unwrap();
        assert_eq!(stock.debit.company, Decimal::from(300));
        let srbnb = legs.iter().find(|l| l.name == "GLE-4").unwrap();
        assert_eq!(srbnb.credit.company, Decimal::from(300));
        assert!(VoucherTotals::of(&legs).is_balanced());
    }

    #[test]
    fn receipt_with_one_sided_asset_posting_is_refused() {
        let a = accounts();
        let legs = vec![leg("GLE-1", ASSET, &a.asset_received_not_billed, 100, 0)];
        let result = plan_receipt_line(
            &ctx(VoucherType::PurchaseReceipt),
            &legs,
            &line(100),
            &a,
            ASSET,
        );
        assert!(matches!(
            result,
            Err(RebalanceError::IncompleteAssetPosting { .. })
        ));
    }

    #[test]
    fn receipt_asset_legs_must_point_at_each_other() {
        let a = accounts();
        // asset debit posted against a different counter account is left alone
        let legs = vec![
            leg("GLE-1", ASSET, "Creditors - AOGC", 100, 0),
            leg("GLE-2", "Creditors - AOGC", ASSET, 0, 100),
        ];
        let changes = plan_receipt_line(
            &ctx(VoucherType::PurchaseReceipt),
            &legs,
            &line(100),
            &a,
            ASSET,
        )
        .unwrap();
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn zero_amount_line_plans_nothing() {
        let changes = plan_receipt_line(
            &ctx(VoucherType::PurchaseReceipt),
            &asset_receipt(0),
            &line(0),
            &accounts(),
            ASSET,
        )
        .unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn invoice_moves_amount_from_asset_to_stock_clearing() {
        let a = accounts();
        let mut legs = vec![
            leg("GLE-10", &a.asset_received_not_billed, "Laptop Supplier", 800, 0),
            leg("GLE-11", "Creditors - AOGC", &a.asset_received_not_billed, 0, 800),
        ];
        let changes =
            plan_invoice_line(&ctx(VoucherType::PurchaseInvoice), &legs, &line(800), &a).unwrap();

        apply_changes(&mut legs, &changes);
        let srbnb = legs
            .iter()
            .find(|l| l.account == a.stock_received_not_billed)
            .unwrap();
        assert_eq!(srbnb.debit.company, Decimal::from(800));
        assert_eq!(srbnb.against.as_deref(), Some("Laptop Supplier"));
        let arbnb = legs.iter().find(|l| l.name == "GLE-10").unwrap();
        assert_eq!(arbnb.debit.company, Decimal::ZERO);
        assert!(VoucherTotals::of(&legs).is_balanced());
    }

    #[test]
    fn second_invoice_line_reuses_the_created_leg() {
        let a = accounts();
        let mut legs = vec![
            leg("GLE-10", &a.asset_received_not_billed, "Laptop Supplier", 500, 0),
            leg("GLE-11", "Creditors - AOGC", &a.asset_received_not_billed, 0, 500),
        ];
        let invoice = ctx(VoucherType::PurchaseInvoice);

        let first = plan_invoice_line(&invoice, &legs, &line(200), &a).unwrap();
        apply_changes(&mut legs, &first);
        let second = plan_invoice_line(&invoice, &legs, &line(300), &a).unwrap();
        apply_changes(&mut legs, &second);

        let srbnb: Vec<_> = legs
            .iter()
            .filter(|l| l.account == a.stock_received_not_billed)
            .collect();
        assert_eq!(srbnb.len(), 1);
        assert_eq!(srbnb[0].debit.company, Decimal::from(500));
    }

    #[test]
    fn debit_note_credits_stock_clearing() {
        let a = accounts();
        let mut legs = vec![
            leg("GLE-10", &a.asset_received_not_billed, "Laptop Supplier", -300, 0),
            leg("GLE-11", "Creditors - AOGC", &a.asset_received_not_billed, 0, -300),
        ];
        let changes =
            plan_invoice_line(&ctx(VoucherType::PurchaseInvoice), &legs, &line(-300), &a).unwrap();

        apply_changes(&mut legs, &changes);
        let srbnb = legs
            .iter()
            .find(|l| l.account == a.stock_received_not_billed)
            .unwrap();
        assert!(srbnb.debit.is_zero());
        assert_eq!(srbnb.credit.company, Decimal::from(300));
        let arbnb = legs.iter().find(|l| l.name == "GLE-10").unwrap();
        assert_eq!(arbnb.debit.company, Decimal::ZERO);
        assert!(VoucherTotals::of(&legs).is_balanced());
    }

    #[test]
    fn invoice_without_asset_leg_is_refused() {
        let a = accounts();
        let legs = vec![leg("GLE-11", "Creditors - AOGC", "x", 0, 100)];
        let result = plan_invoice_line(&ctx(VoucherType::PurchaseInvoice), &legs, &line(100), &a);
        assert!(matches!(result, Err(RebalanceError::MissingAssetLeg { .. })));
    }

    #[test]
    fn set_against_relabels_every_leg() {
        let a = accounts();
        let mut legs = asset_receipt(10);
        apply_change(
            &mut legs,
            &GlChange::SetAgainst {
                against: a.invoice_against_label(),
            },
            "",
        );
        assert!(legs
            .iter()
            .all(|l| l.is_against(&a.stock_received_not_billed)
                && l.is_against(&a.asset_received_not_billed)));
    }
}
