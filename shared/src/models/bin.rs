//! Bin (per item-warehouse stock summary) models

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::receipt::ReceiptLine;
use crate::types::DocStatus;

/// A bin to create for an item+warehouse pair that has receipts but no summary yet.
///
/// Reservation, indent and order counters always start at zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewBin {
    pub item_code: String,
    pub warehouse: String,
    pub stock_uom: Option<String>,
    pub actual_qty: Decimal,
    pub projected_qty: Decimal,
    pub valuation_rate: Decimal,
    pub stock_value: Decimal,
    pub reserved_qty: Decimal,
    pub reserved_qty_for_production: Decimal,
    pub reserved_qty_for_sub_contract: Decimal,
    pub reserved_qty_for_production_plan: Decimal,
    pub reserved_stock: Decimal,
    pub indented_qty: Decimal,
    pub ordered_qty: Decimal,
    pub owner: String,
    pub created_on: NaiveDate,
    pub docstatus: DocStatus,
}

#[derive(Default)]
struct BinAccumulator<'a> {
    first: Option<&'a ReceiptLine>,
    qty: Decimal,
    value: Decimal,
    rate_sum: Decimal,
    lines: u32,
}

impl NewBin {
    /// Summarize receipt lines into one bin per (item, warehouse).
    ///
    /// Quantity and value are summed. The valuation rate is the plain mean of
    /// the line rates. Owner and creation date come from the earliest line.
    /// Output is ordered by item code, then warehouse.
    pub fn aggregate(lines: &[ReceiptLine]) -> Vec<NewBin> {
        let mut groups: BTreeMap<(&str, &str), BinAccumulator<'_>> = BTreeMap::new();

        for line in lines {
            let acc = groups
                .entry((line.item_code.as_str(), line.warehouse.as_str()))
                .or_default();
            acc.qty += line.stock_qty();
            acc.value += line.stock_value();
            acc.rate_sum += line.valuation_rate;
            acc.lines += 1;
            if acc.first.map_or(true, |f| line.posting() < f.posting()) {
                acc.first = Some(line);
            }
        }

        groups
            .into_iter()
            .filter_map(|((item_code, warehouse), acc)| {
                let first = acc.first?;
                let actual_qty = acc.qty;
                Some(NewBin {
                    item_code: item_code.to_string(),
                    warehouse: warehouse.to_string(),
                    stock_uom: first.stock_uom.clone(),
                    actual_qty,
                    projected_qty: actual_qty,
                    valuation_rate: acc.rate_sum / Decimal::from(acc.lines),
                    stock_value: acc.value,
                    reserved_qty: Decimal::ZERO,
                    reserved_qty_for_production: Decimal::ZERO,
                    reserved_qty_for_sub_contract: Decimal::ZERO,
                    reserved_qty_for_production_plan: Decimal::ZERO,
                    reserved_stock: Decimal::ZERO,
                    indented_qty: Decimal::ZERO,
                    ordered_qty: Decimal::ZERO,
                    owner: first.owner.clone(),
                    created_on: first.posting_date,
                    docstatus: first.docstatus,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn line(name: &str, warehouse: &str, day: u32, qty: i64, rate: i64) -> ReceiptLine {
        ReceiptLine {
            name: name.into(),
            voucher_no: format!("PR-{}", name),
            item_code: "Laptop-A".into(),
            warehouse: warehouse.into(),
            qty: Decimal::from(qty),
            conversion_factor: Decimal::ONE,
            valuation_rate: Decimal::from(rate),
            stock_uom: Some("Nos".into()),
            batch_no: None,
            serial_no: None,
            posting_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            posting_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            owner: format!("user{}@example.com", day),
            company: "AOGC".into(),
            business_category: None,
            branch: None,
            project: None,
            fiscal_year: None,
            docstatus: DocStatus::Submitted,
        }
    }

    #[test]
    fn groups_by_warehouse_and_sums_quantities() {
        let lines = vec![
            line("a", "Stores", 5, 4, 100),
            line("b", "Stores", 2, 6, 200),
            line("c", "Finished Goods", 9, 1, 50),
        ];

        let bins = NewBin::aggregate(&lines);
        assert_eq!(bins.len(), 2);

        let stores = bins.iter().find(|b| b.warehouse == "Stores").unwrap();
        assert_eq!(stores.actual_qty, Decimal::from(10));
        assert_eq!(stores.projected_qty, Decimal::from(10));
        assert_eq!(stores.stock_value, Decimal::from(1600));
        // plain mean of 100 and 200
        assert_eq!(stores.valuation_rate, Decimal::from(150));
        assert_eq!(stores.owner, "user2@example.com");
        assert_eq!(stores.reserved_qty, Decimal::ZERO);
        assert_eq!(stores.ordered_qty, Decimal::ZERO);
    }

    #[test]
    fn output_is_sorted_by_warehouse_within_item() {
        let lines = vec![line("a", "Zeta", 1, 1, 1), line("b", "Alpha", 1, 1, 1)];
        let warehouses: Vec<_> = NewBin::aggregate(&lines)
            .into_iter()
            .map(|b| b.warehouse)
            .collect();
        assert_eq!(warehouses, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn no_lines_means_no_bins() {
        assert!(NewBin::aggregate(&[]).is_empty());
    }
}
