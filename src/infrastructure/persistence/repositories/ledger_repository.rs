//! Append-only ledger persistence.
//!
//! Committed rows are never updated or deleted, with one exception: the
//! `is_reversed` flag on the original entry when a reversal is appended.
//! Every append also moves the retailer's outstanding debt and available
//! credit in the same transaction, which keeps the credit invariant and
//! the ledger in lockstep.

use crate::domain::ledger::CreditLedgerEntry;
use crate::domain::repositories::LedgerRepository;
use crate::domain::types::{OrderId, RetailerId, TransactionType, VendorId};
use crate::infrastructure::persistence::database::Database;
use crate::infrastructure::persistence::repositories::order_writer::{
    insert_ledger_entry, update_retailer_balances,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;
use uuid::Uuid;

pub struct SqliteLedgerRepository {
    database: Database,
}

impl SqliteLedgerRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

type EntryRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    bool,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
);

const ENTRY_FIELDS: &str = r#"
    id, retailer_id, vendor_id, transaction_type, amount,
    previous_balance, running_balance, linked_order_id,
    is_reversed, reversal_of_entry_id, note, created_at
"#;

fn row_to_entry(row: EntryRow) -> Result<CreditLedgerEntry> {
    let (
        id,
        retailer_id,
        vendor_id,
        transaction_type,
        amount,
        previous_balance,
        running_balance,
        linked_order_id,
        is_reversed,
        reversal_of_entry_id,
        note,
        created_at,
    ) = row;
    Ok(CreditLedgerEntry {
        id: Uuid::parse_str(&id).context("Bad entry id")?,
        retailer_id: Uuid::parse_str(&retailer_id).context("Bad retailer id")?,
        vendor_id: Uuid::parse_str(&vendor_id).context("Bad vendor id")?,
        transaction_type: transaction_type
            .parse::<TransactionType>()
            .map_err(|e| anyhow::anyhow!(e))?,
        amount: Decimal::from_str(&amount).unwrap_or_default(),
        previous_balance: Decimal::from_str(&previous_balance).unwrap_or_default(),
        running_balance: Decimal::from_str(&running_balance).unwrap_or_default(),
        linked_order_id: linked_order_id
            .map(|id| Uuid::parse_str(&id).context("Bad order id"))
            .transpose()?,
        is_reversed,
        reversal_of_entry_id: reversal_of_entry_id
            .map(|id| Uuid::parse_str(&id).context("Bad reversal id"))
            .transpose()?,
        note,
        created_at,
    })
}

/// Latest (running_balance, seq) for a pair, inside a transaction.
async fn pair_tail(
    tx: &mut Transaction<'_, Sqlite>,
    retailer_id: RetailerId,
    vendor_id: VendorId,
) -> Result<(Decimal, i64)> {
    let row: Option<(String, i64)> = sqlx::query_as(
        r#"
        SELECT running_balance, seq FROM credit_ledger
        WHERE retailer_id = $1 AND vendor_id = $2
        ORDER BY seq DESC LIMIT 1
        "#,
    )
    .bind(retailer_id.to_string())
    .bind(vendor_id.to_string())
    .fetch_optional(&mut **tx)
    .await
    .context("Failed to read pair tail")?;

    Ok(row
        .map(|(balance, seq)| (Decimal::from_str(&balance).unwrap_or_default(), seq))
        .unwrap_or((Decimal::ZERO, 0)))
}

async fn retailer_balances(
    tx: &mut Transaction<'_, Sqlite>,
    retailer_id: RetailerId,
) -> Result<(Decimal, Decimal)> {
    let row: Option<(String, String)> = sqlx::query_as(
        "SELECT outstanding_debt, available_credit FROM retailers WHERE id = $1",
    )
    .bind(retailer_id.to_string())
    .fetch_optional(&mut **tx)
    .await
    .context("Failed to read retailer balances")?;

    match row {
        Some((debt, available)) => Ok((
            Decimal::from_str(&debt).unwrap_or_default(),
            Decimal::from_str(&available).unwrap_or_default(),
        )),
        None => anyhow::bail!("Retailer {} not found", retailer_id),
    }
}

#[async_trait]
impl LedgerRepository for SqliteLedgerRepository {
    async fn append(
        &self,
        retailer_id: RetailerId,
        vendor_id: VendorId,
        transaction_type: TransactionType,
        amount: Decimal,
        linked_order_id: Option<OrderId>,
        note: Option<&str>,
    ) -> Result<CreditLedgerEntry> {
        anyhow::ensure!(amount > Decimal::ZERO, "Ledger amounts must be positive");

        let mut tx = self.database.pool.begin().await?;

        let (pair_balance, last_seq) = pair_tail(&mut tx, retailer_id, vendor_id).await?;
        let entry = CreditLedgerEntry::next(
            retailer_id,
            vendor_id,
            transaction_type,
            amount,
            pair_balance,
            linked_order_id,
            note.map(str::to_string),
        );
        insert_ledger_entry(&mut tx, &entry, last_seq + 1).await?;

        let (debt, available) = retailer_balances(&mut tx, retailer_id).await?;
        let signed = entry.signed_amount();
        update_retailer_balances(&mut tx, retailer_id, debt + signed, available - signed).await?;

        tx.commit().await.context("Failed to commit ledger append")?;
        Ok(entry)
    }

    async fn reverse(&self, entry_id: Uuid, reason: &str) -> Result<CreditLedgerEntry> {
        let mut tx = self.database.pool.begin().await?;

        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM credit_ledger WHERE id = $1",
            ENTRY_FIELDS
        ))
        .bind(entry_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to load ledger entry")?;
        let original = row
            .map(row_to_entry)
            .transpose()?
            .with_context(|| format!("Ledger entry {} not found", entry_id))?;

        let (pair_balance, last_seq) =
            pair_tail(&mut tx, original.retailer_id, original.vendor_id).await?;
        let reversal = original
            .reversal_for(pair_balance, reason)
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        insert_ledger_entry(&mut tx, &reversal, last_seq + 1).await?;

        // The only permitted mutation of a committed row.
        sqlx::query("UPDATE credit_ledger SET is_reversed = 1 WHERE id = $1")
            .bind(entry_id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to flag original entry as reversed")?;

        let (debt, available) = retailer_balances(&mut tx, original.retailer_id).await?;
        let signed = reversal.signed_amount();
        update_retailer_balances(
            &mut tx,
            original.retailer_id,
            debt + signed,
            available - signed,
        )
        .await?;

        tx.commit().await.context("Failed to commit reversal")?;
        Ok(reversal)
    }

    async fn find_entry(&self, entry_id: Uuid) -> Result<Option<CreditLedgerEntry>> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM credit_ledger WHERE id = $1",
            ENTRY_FIELDS
        ))
        .bind(entry_id.to_string())
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to load ledger entry")?;

        row.map(row_to_entry).transpose()
    }

    async fn chain(
        &self,
        retailer_id: RetailerId,
        vendor_id: VendorId,
    ) -> Result<Vec<CreditLedgerEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            SELECT {} FROM credit_ledger
            WHERE retailer_id = $1 AND vendor_id = $2
            ORDER BY seq
            "#,
            ENTRY_FIELDS
        ))
        .bind(retailer_id.to_string())
        .bind(vendor_id.to_string())
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to load ledger chain")?;

        rows.into_iter().map(row_to_entry).collect()
    }

    async fn latest_balance(
        &self,
        retailer_id: RetailerId,
        vendor_id: VendorId,
    ) -> Result<Decimal> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT running_balance FROM credit_ledger
            WHERE retailer_id = $1 AND vendor_id = $2
            ORDER BY seq DESC LIMIT 1
            "#,
        )
        .bind(retailer_id.to_string())
        .bind(vendor_id.to_string())
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to read latest balance")?;

        Ok(row
            .map(|(balance,)| Decimal::from_str(&balance).unwrap_or_default())
            .unwrap_or(Decimal::ZERO))
    }

    async fn payments_for_retailer(
        &self,
        retailer_id: RetailerId,
    ) -> Result<Vec<CreditLedgerEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            SELECT {} FROM credit_ledger
            WHERE retailer_id = $1 AND transaction_type = 'PAYMENT_DEBIT'
            ORDER BY created_at
            "#,
            ENTRY_FIELDS
        ))
        .bind(retailer_id.to_string())
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to load retailer payments")?;

        rows.into_iter().map(row_to_entry).collect()
    }
}
