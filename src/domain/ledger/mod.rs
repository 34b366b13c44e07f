pub mod entry;

pub use entry::{effective_balance, verify_chain, CreditLedgerEntry};
