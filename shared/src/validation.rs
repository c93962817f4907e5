//! Validation helpers for names coming from the ERP

use crate::rebalance::LedgerAccounts;

/// Longest document name the ERP accepts
pub const MAX_NAME_LENGTH: usize = 140;

/// Validate a document name (item code, voucher number, asset category)
pub fn validate_document_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Name must not be empty");
    }
    if name.trim() != name {
        return Err("Name must not start or end with whitespace");
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err("Name is too long");
    }
    if name.chars().any(char::is_control) {
        return Err("Name must not contain control characters");
    }
    Ok(())
}

/// Company abbreviation suffix of a ledger account name ("Stock In Hand - AOGC" -> "AOGC")
pub fn company_abbreviation(account: &str) -> Option<&str> {
    account
        .rsplit_once(" - ")
        .map(|(_, abbr)| abbr.trim())
        .filter(|abbr| !abbr.is_empty())
}

/// Validate a ledger account name: a document name carrying a company suffix
pub fn validate_account_name(account: &str) -> Result<(), &'static str> {
    validate_document_name(account)?;
    if company_abbreviation(account).is_none() {
        return Err("Account name must end with ' - <company abbreviation>'");
    }
    Ok(())
}

/// Validate that the configured correction accounts are distinct and belong to one company
pub fn validate_ledger_accounts(accounts: &LedgerAccounts) -> Result<(), &'static str> {
    let names = [
        accounts.stock_in_hand.as_str(),
        accounts.stock_received_not_billed.as_str(),
        accounts.asset_received_not_billed.as_str(),
    ];

    for name in names {
        validate_account_name(name)?;
    }

    if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
        return Err("Correction accounts must be distinct");
    }

    let company = company_abbreviation(names[0]);
    if names.iter().any(|n| company_abbreviation(n) != company) {
        return Err("Correction accounts must belong to the same company");
    }

    Ok(())
}

/// Validate that an asset account belongs to the same company as the correction accounts
pub fn validate_asset_account(
    asset_account: &str,
    accounts: &LedgerAccounts,
) -> Result<(), &'static str> {
    validate_account_name(asset_account)?;
    if company_abbreviation(asset_account) != company_abbreviation(&accounts.stock_in_hand) {
        return Err("Asset account belongs to a different company");
    }
    if asset_account == accounts.asset_received_not_billed
        || asset_account == accounts.stock_received_not_billed
        || asset_account == accounts.stock_in_hand
    {
        return Err("Asset account must not be one of the clearing accounts");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_names() {
        assert!(validate_document_name("Laptop-A").is_ok());
        assert!(validate_document_name("").is_err());
        assert!(validate_document_name(" Laptop-A").is_err());
        assert!(validate_document_name("Lap\ntop").is_err());
        assert!(validate_document_name(&"x".repeat(141)).is_err());
    }

    #[test]
    fn abbreviation_is_taken_from_the_last_separator() {
        assert_eq!(company_abbreviation("Stock In Hand - AOGC"), Some("AOGC"));
        assert_eq!(company_abbreviation("Plant - Machinery - AOGC"), Some("AOGC"));
        assert_eq!(company_abbreviation("Stock In Hand"), None);
        assert_eq!(company_abbreviation("Stock In Hand - "), None);
    }

    #[test]
    fn default_accounts_are_valid() {
        assert!(validate_ledger_accounts(&LedgerAccounts::default()).is_ok());
    }

    #[test]
    fn accounts_from_mixed_companies_are_rejected() {
        let accounts = LedgerAccounts {
            stock_in_hand: "Stock In Hand - AOGC".into(),
            stock_received_not_billed: "Stock Received But Not Billed - XYZ".into(),
            asset_received_not_billed: "Asset Received But Not Billed - AOGC".into(),
        };
        assert!(validate_ledger_accounts(&accounts).is_err());
    }

    #[test]
    fn duplicate_accounts_are_rejected() {
        let accounts = LedgerAccounts {
            stock_in_hand: "Stock In Hand - AOGC".into(),
            stock_received_not_billed: "Stock In Hand - AOGC".into(),
            asset_received_not_billed: "Asset Received But Not Billed - AOGC".into(),
        };
        assert_eq!(
            validate_ledger_accounts(&accounts),
            Err("Correction accounts must be distinct")
        );
    }

    #[test]
    fn asset_account_checks() {
        let accounts = LedgerAccounts::default();
        assert!(validate_asset_account("Fixed Assets - AOGC", &accounts).is_ok());
        assert!(validate_asset_account("Fixed Assets - XYZ", &accounts).is_err());
        assert!(validate_asset_account(&accounts.asset_received_not_billed, &accounts).is_err());
    }
}
