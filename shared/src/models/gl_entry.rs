//! General ledger entry models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::receipt::LineAmount;
use crate::error::RecordError;
use crate::types::VoucherType;

/// One side (debit or credit) of a GL leg in the three representations the ERP keeps
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegAmounts {
    /// Company currency
    pub company: Decimal,
    pub account_currency: Decimal,
    pub transaction_currency: Decimal,
}

impl LegAmounts {
    pub const ZERO: LegAmounts = LegAmounts {
        company: Decimal::ZERO,
        account_currency: Decimal::ZERO,
        transaction_currency: Decimal::ZERO,
    };

    /// Company and account currency take the base amount, transaction currency the raw amount
    pub fn from_line(amount: &LineAmount) -> Self {
        Self {
            company: amount.base_amount,
            account_currency: amount.base_amount,
            transaction_currency: amount.amount,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.company.is_zero()
            && self.account_currency.is_zero()
            && self.transaction_currency.is_zero()
    }

    fn is_negative(&self) -> bool {
        self.company < Decimal::ZERO
            || self.account_currency < Decimal::ZERO
            || self.transaction_currency < Decimal::ZERO
    }
}

impl std::ops::Add for LegAmounts {
    type Output = LegAmounts;

    fn add(self, rhs: Self) -> Self::Output {
        LegAmounts {
            company: self.company + rhs.company,
            account_currency: self.account_currency + rhs.account_currency,
            transaction_currency: self.transaction_currency + rhs.transaction_currency,
        }
    }
}

impl std::ops::Neg for LegAmounts {
    type Output = LegAmounts;

    fn neg(self) -> Self::Output {
        LegAmounts {
            company: -self.company,
            account_currency: -self.account_currency,
            transaction_currency: -self.transaction_currency,
        }
    }
}

/// Header fields of a voucher that every GL leg it owns repeats
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoucherContext {
    pub voucher_type: VoucherType,
    pub voucher_no: String,
    pub posting_date: NaiveDate,
    pub company: String,
    pub currency: String,
    pub conversion_rate: Decimal,
    pub cost_center: Option<String>,
    pub branch: Option<String>,
    pub owner: String,
    pub fiscal_year: Option<String>,
    /// Supplier, used as the counter-party on invoice legs
    pub supplier: Option<String>,
}

/// A GL leg to insert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewGlEntry {
    pub posting_date: NaiveDate,
    pub account: String,
    pub debit: LegAmounts,
    pub credit: LegAmounts,
    pub voucher_type: VoucherType,
    pub voucher_no: String,
    pub company: String,
    pub account_currency: String,
    pub transaction_currency: String,
    pub transaction_exchange_rate: Decimal,
    pub cost_center: Option<String>,
    pub branch: Option<String>,
    pub against: String,
    pub fiscal_year: Option<String>,
    pub owner: String,
    pub remarks: String,
}

/// Remark written on every leg the corrections create
pub const STOCK_REMARK: &str = "Accounting Entry for Stock";

impl NewGlEntry {
    /// A debit-only leg
    pub fn debit(
        ctx: &VoucherContext,
        account: &str,
        against: &str,
        amounts: LegAmounts,
    ) -> Result<Self, RecordError> {
        Self::build(ctx, account, against, amounts, LegAmounts::ZERO)
    }

    /// A credit-only leg
    pub fn credit(
        ctx: &VoucherContext,
        account: &str,
        against: &str,
        amounts: LegAmounts,
    ) -> Result<Self, RecordError> {
        Self::build(ctx, account, against, LegAmounts::ZERO, amounts)
    }

    /// A leg that debits `amounts`. Negative amounts (returns, debit notes)
    /// are posted as a credit of the absolute amounts.
    pub fn signed_debit(
        ctx: &VoucherContext,
        account: &str,
        against: &str,
        amounts: LegAmounts,
    ) -> Result<Self, RecordError> {
        if amounts.is_negative() {
            Self::credit(ctx, account, against, -amounts)
        } else {
            Self::debit(ctx, account, against, amounts)
        }
    }

    /// A leg that credits `amounts`, flipped to a debit when they are negative
    pub fn signed_credit(
        ctx: &VoucherContext,
        account: &str,
        against: &str,
        amounts: LegAmounts,
    ) -> Result<Self, RecordError> {
        if amounts.is_negative() {
            Self::debit(ctx, account, against, -amounts)
        } else {
            Self::credit(ctx, account, against, amounts)
        }
    }

    fn build(
        ctx: &VoucherContext,
        account: &str,
        against: &str,
        debit: LegAmounts,
        credit: LegAmounts,
    ) -> Result<Self, RecordError> {
        if account.trim().is_empty() {
            return Err(RecordError::MissingField { field: "account" });
        }
        if ctx.voucher_no.trim().is_empty() {
            return Err(RecordError::MissingField { field: "voucher_no" });
        }
        if debit.is_negative() {
            return Err(RecordError::NegativeAmount {
                field: "debit",
                value: debit.company,
            });
        }
        if credit.is_negative() {
            return Err(RecordError::NegativeAmount {
                field: "credit",
                value: credit.company,
            });
        }
        if !debit.is_zero() && !credit.is_zero() {
            return Err(RecordError::DebitAndCredit);
        }

        Ok(Self {
            posting_date: ctx.posting_date,
            account: account.to_string(),
            debit,
            credit,
            voucher_type: ctx.voucher_type,
            voucher_no: ctx.voucher_no.clone(),
            company: ctx.company.clone(),
            account_currency: ctx.currency.clone(),
            transaction_currency: ctx.currency.clone(),
            transaction_exchange_rate: ctx.conversion_rate,
            cost_center: ctx.cost_center.clone(),
            branch: ctx.branch.clone(),
            against: against.to_string(),
            fiscal_year: ctx.fiscal_year.clone(),
            owner: ctx.owner.clone(),
            remarks: STOCK_REMARK.to_string(),
        })
    }
}

/// An existing GL leg of a voucher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlLeg {
    pub name: String,
    pub account: String,
    pub against: Option<String>,
    pub debit: LegAmounts,
    pub credit: LegAmounts,
}

impl GlLeg {
    pub fn from_new(name: impl Into<String>, entry: &NewGlEntry) -> Self {
        Self {
            name: name.into(),
            account: entry.account.clone(),
            against: Some(entry.against.clone()),
            debit: entry.debit,
            credit: entry.credit,
        }
    }

    /// Whether the comma separated `against` list names the account
    pub fn is_against(&self, account: &str) -> bool {
        self.against
            .as_deref()
            .map(|list| list.split(',').any(|a| a.trim() == account))
            .unwrap_or(false)
    }
}

/// Company-currency totals of a voucher's legs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoucherTotals {
    pub debit: Decimal,
    pub credit: Decimal,
}

impl VoucherTotals {
    pub fn of(legs: &[GlLeg]) -> Self {
        legs.iter().fold(Self::default(), |acc, leg| Self {
            debit: acc.debit + leg.debit.company,
            credit: acc.credit + leg.credit.company,
        })
    }

    /// Debit minus credit
    pub fn imbalance(&self) -> Decimal {
        self.debit - self.credit
    }

    pub fn is_balanced(&self) -> bool {
        self.imbalance().is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> VoucherContext {
        VoucherContext {
            voucher_type: VoucherType::PurchaseReceipt,
            voucher_no: "PR-0001".into(),
            posting_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            company: "AOGC".into(),
            currency: "AFN".into(),
            conversion_rate: Decimal::ONE,
            cost_center: Some("Main - AOGC".into()),
            branch: None,
            owner: "admin@example.com".into(),
            fiscal_year: Some("2024".into()),
            supplier: None,
        }
    }

    fn amounts(value: i64) -> LegAmounts {
        LegAmounts {
            company: Decimal::from(value),
            account_currency: Decimal::from(value),
            transaction_currency: Decimal::from(value),
        }
    }

    #[test]
    fn debit_leg_copies_voucher_header() {
        let entry = NewGlEntry::debit(&ctx(), "Stock In Hand - AOGC", "SRBNB", amounts(500)).unwrap();
        assert_eq!(entry.voucher_no, "PR-0001");
        assert_eq!(entry.debit.company, Decimal::from(500));
        assert!(entry.credit.is_zero());
        assert_eq!(entry.remarks, STOCK_REMARK);
        assert_eq!(entry.cost_center.as_deref(), Some("Main - AOGC"));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let result = NewGlEntry::credit(&ctx(), "SRBNB", "Stock", amounts(-1));
        assert!(matches!(result, Err(RecordError::NegativeAmount { field: "credit", .. })));
    }

    #[test]
    fn negative_signed_debit_becomes_a_credit() {
        let entry =
            NewGlEntry::signed_debit(&ctx(), "Stock In Hand - AOGC", "SRBNB", amounts(-200)).unwrap();
        assert!(entry.debit.is_zero());
        assert_eq!(entry.credit.company, Decimal::from(200));

        let entry = NewGlEntry::signed_credit(&ctx(), "SRBNB", "Stock", amounts(-200)).unwrap();
        assert_eq!(entry.debit.company, Decimal::from(200));
        assert!(entry.credit.is_zero());
    }

    #[test]
    fn mixed_sign_amounts_are_rejected() {
        let mixed = LegAmounts {
            company: Decimal::from(-5),
            account_currency: Decimal::from(-5),
            transaction_currency: Decimal::from(3),
        };
        let result = NewGlEntry::signed_debit(&ctx(), "Stock In Hand - AOGC", "SRBNB", mixed);
        assert!(matches!(result, Err(RecordError::NegativeAmount { .. })));
    }

    #[test]
    fn empty_account_is_rejected() {
        let result = NewGlEntry::debit(&ctx(), " ", "x", amounts(1));
        assert_eq!(result, Err(RecordError::MissingField { field: "account" }));
    }

    #[test]
    fn against_list_is_matched_per_entry() {
        let leg = GlLeg {
            name: "GLE-1".into(),
            account: "Fixed Assets - AOGC".into(),
            against: Some("Asset Received But Not Billed - AOGC, Creditors - AOGC".into()),
            debit: amounts(10),
            credit: LegAmounts::ZERO,
        };
        assert!(leg.is_against("Creditors - AOGC"));
        assert!(leg.is_against("Asset Received But Not Billed - AOGC"));
        assert!(!leg.is_against("Creditors"));
    }

    #[test]
    fn totals_report_imbalance() {
        let legs = vec![
            GlLeg {
                name: "a".into(),
                account: "x".into(),
                against: None,
                debit: amounts(70),
                credit: LegAmounts::ZERO,
            },
            GlLeg {
                name: "b".into(),
                account: "y".into(),
                against: None,
                debit: LegAmounts::ZERO,
                credit: amounts(50),
            },
        ];
        let totals = VoucherTotals::of(&legs);
        assert_eq!(totals.imbalance(), Decimal::from(20));
        assert!(!totals.is_balanced());
    }
}
