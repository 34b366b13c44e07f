use crate::domain::errors::LedgerError;
use crate::domain::types::{LedgerEntryId, OrderId, RetailerId, TransactionType, VendorId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One append-only row of the credit ledger.
///
/// Committed rows are never updated or deleted; the only correction
/// mechanism is `reversal_for`, which produces a compensating entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditLedgerEntry {
    pub id: LedgerEntryId,
    pub retailer_id: RetailerId,
    pub vendor_id: VendorId,
    pub transaction_type: TransactionType,
    /// Always positive; direction comes from `transaction_type`.
    pub amount: Decimal,
    pub previous_balance: Decimal,
    pub running_balance: Decimal,
    pub linked_order_id: Option<OrderId>,
    pub is_reversed: bool,
    pub reversal_of_entry_id: Option<LedgerEntryId>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CreditLedgerEntry {
    /// Builds the next entry in a (retailer, vendor) chain given the
    /// authoritative balance carried by the previous entry.
    pub fn next(
        retailer_id: RetailerId,
        vendor_id: VendorId,
        transaction_type: TransactionType,
        amount: Decimal,
        previous_balance: Decimal,
        linked_order_id: Option<OrderId>,
        note: Option<String>,
    ) -> Self {
        let signed = amount * Decimal::from(transaction_type.sign());
        Self {
            id: Uuid::new_v4(),
            retailer_id,
            vendor_id,
            transaction_type,
            amount,
            previous_balance,
            running_balance: previous_balance + signed,
            linked_order_id,
            is_reversed: false,
            reversal_of_entry_id: None,
            note,
            created_at: Utc::now(),
        }
    }

    pub fn signed_amount(&self) -> Decimal {
        self.amount * Decimal::from(self.transaction_type.sign())
    }

    /// Compensating entry that cancels this one. The original must not
    /// already be reversed and must not itself be a reversal.
    pub fn reversal_for(
        &self,
        current_balance: Decimal,
        reason: &str,
    ) -> Result<CreditLedgerEntry, LedgerError> {
        if self.is_reversed {
            return Err(LedgerError::AlreadyReversed { entry_id: self.id });
        }
        if self.reversal_of_entry_id.is_some() {
            return Err(LedgerError::ReversalOfReversal { entry_id: self.id });
        }
        let compensating_type = match self.transaction_type {
            TransactionType::OrderCredit | TransactionType::AdjustmentCredit => {
                TransactionType::AdjustmentDebit
            }
            TransactionType::PaymentDebit | TransactionType::AdjustmentDebit => {
                TransactionType::AdjustmentCredit
            }
        };
        let mut entry = CreditLedgerEntry::next(
            self.retailer_id,
            self.vendor_id,
            compensating_type,
            self.amount,
            current_balance,
            self.linked_order_id,
            Some(reason.to_string()),
        );
        entry.is_reversed = true;
        entry.reversal_of_entry_id = Some(self.id);
        Ok(entry)
    }
}

/// Replays a (retailer, vendor) chain and verifies the running-balance
/// invariant: each row's balance equals the previous row's balance plus the
/// signed amount, and reversed pairs cancel out.
pub fn verify_chain(entries: &[CreditLedgerEntry]) -> Result<Decimal, LedgerError> {
    let mut balance = match entries.first() {
        Some(first) => first.previous_balance,
        None => return Ok(Decimal::ZERO),
    };
    for entry in entries {
        if entry.previous_balance != balance {
            return Err(LedgerError::BalanceMismatch {
                retailer_id: entry.retailer_id,
                expected: balance,
                found: entry.previous_balance,
            });
        }
        balance += entry.signed_amount();
        if entry.running_balance != balance {
            return Err(LedgerError::BalanceMismatch {
                retailer_id: entry.retailer_id,
                expected: balance,
                found: entry.running_balance,
            });
        }
    }
    Ok(balance)
}

/// Cumulative signed sum of non-reversed entries. Must equal the chain's
/// final running balance whenever reversals are paired correctly.
pub fn effective_balance(entries: &[CreditLedgerEntry]) -> Decimal {
    entries
        .iter()
        .filter(|e| !e.is_reversed)
        .map(|e| e.signed_amount())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn chain() -> (RetailerId, VendorId, Vec<CreditLedgerEntry>) {
        let retailer = Uuid::new_v4();
        let vendor = Uuid::new_v4();
        let e1 = CreditLedgerEntry::next(
            retailer,
            vendor,
            TransactionType::OrderCredit,
            dec!(2000),
            Decimal::ZERO,
            Some(Uuid::new_v4()),
            None,
        );
        let e2 = CreditLedgerEntry::next(
            retailer,
            vendor,
            TransactionType::PaymentDebit,
            dec!(500),
            e1.running_balance,
            e1.linked_order_id,
            None,
        );
        (retailer, vendor, vec![e1, e2])
    }

    #[test]
    fn test_running_balance_accumulates() {
        let (_, _, entries) = chain();
        assert_eq!(entries[0].running_balance, dec!(2000));
        assert_eq!(entries[1].running_balance, dec!(1500));
        assert_eq!(verify_chain(&entries).unwrap(), dec!(1500));
    }

    #[test]
    fn test_verify_chain_detects_gap() {
        let (_, _, mut entries) = chain();
        entries[1].previous_balance = dec!(1999);
        assert!(verify_chain(&entries).is_err());
    }

    #[test]
    fn test_reversal_restores_pre_append_balance() {
        let (_, _, mut entries) = chain();
        let current = entries.last().unwrap().running_balance;
        let reversal = entries[1].reversal_for(current, "payment bounced").unwrap();
        entries[1].is_reversed = true;
        assert_eq!(reversal.running_balance, dec!(2000));
        assert_eq!(reversal.reversal_of_entry_id, Some(entries[1].id));

        let mut full = entries.clone();
        full.push(reversal);
        // Non-reversed view: only the original order credit remains
        assert_eq!(effective_balance(&full), dec!(2000));
        assert_eq!(verify_chain(&full).unwrap(), dec!(2000));
    }

    #[test]
    fn test_double_reversal_rejected() {
        let (_, _, mut entries) = chain();
        entries[1].is_reversed = true;
        assert!(matches!(
            entries[1].reversal_for(dec!(2000), "again"),
            Err(LedgerError::AlreadyReversed { .. })
        ));
    }

    #[test]
    fn test_reversing_a_reversal_rejected() {
        let (_, _, entries) = chain();
        let current = entries.last().unwrap().running_balance;
        let reversal = entries[1].reversal_for(current, "bounced").unwrap();
        assert!(matches!(
            reversal.reversal_for(reversal.running_balance, "undo the undo"),
            Err(LedgerError::ReversalOfReversal { .. })
        ));
    }
}
