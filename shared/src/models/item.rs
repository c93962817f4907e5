//! Item master models

use serde::{Deserialize, Serialize};

/// Item master record as far as the corrections are concerned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub item_code: String,
    pub item_name: String,
    pub stock_uom: Option<String>,
    #[serde(flatten)]
    pub classification: ItemClassification,
}

/// Classification flags that decide whether an item is tracked as stock or as an asset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemClassification {
    pub is_stock_item: bool,
    pub is_fixed_asset: bool,
    pub auto_create_assets: bool,
    pub is_service: bool,
    pub asset_category: Option<String>,
    pub asset_naming_series: Option<String>,
}

impl ItemClassification {
    /// Flags of a plain inventory item: stock tracked, no asset bookkeeping
    pub fn stock() -> Self {
        Self {
            is_stock_item: true,
            is_fixed_asset: false,
            auto_create_assets: false,
            is_service: false,
            asset_category: None,
            asset_naming_series: None,
        }
    }

    pub fn is_asset(&self) -> bool {
        self.is_fixed_asset || self.asset_category.is_some()
    }
}
