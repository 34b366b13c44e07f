use crate::domain::catalog::VendorProduct;
use crate::domain::party::{Vendor, WorkingHours};
use crate::domain::repositories::VendorRepository;
use crate::domain::types::{ProductId, VendorId};
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

pub struct SqliteVendorRepository {
    database: Database,
}

impl SqliteVendorRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

type VendorRow = (
    String,
    String,
    String,
    bool,
    bool,
    String,
    String,
    String,
    i64,
    i64,
    i64,
    String,
    String,
    DateTime<Utc>,
);

fn row_to_vendor(row: VendorRow) -> Result<Vendor> {
    let (
        id,
        name,
        phone,
        is_approved,
        is_active,
        reliability_score,
        work_start,
        work_end,
        utc_offset_minutes,
        max_active_orders,
        max_pending_orders,
        delivery_zones,
        district,
        created_at,
    ) = row;
    Ok(Vendor {
        id: Uuid::parse_str(&id).context("Bad vendor id")?,
        name,
        phone,
        is_approved,
        is_active,
        reliability_score: Decimal::from_str(&reliability_score).unwrap_or_default(),
        working_hours: WorkingHours::new(
            NaiveTime::from_str(&work_start).context("Bad vendor work_start")?,
            NaiveTime::from_str(&work_end).context("Bad vendor work_end")?,
            utc_offset_minutes as i32,
        ),
        max_active_orders: max_active_orders as u32,
        max_pending_orders: max_pending_orders as u32,
        delivery_zones: serde_json::from_str(&delivery_zones).unwrap_or_default(),
        district,
        created_at,
    })
}

const VENDOR_FIELDS: &str = r#"
    id, name, phone, is_approved, is_active, reliability_score,
    work_start, work_end, utc_offset_minutes, max_active_orders,
    max_pending_orders, delivery_zones, district, created_at
"#;

type ListingRow = (String, String, String, String, bool, String, String, DateTime<Utc>);

fn row_to_listing(row: ListingRow) -> Result<VendorProduct> {
    let (vendor_id, product_id, price, stock, is_available, min_qty, max_qty, updated_at) = row;
    Ok(VendorProduct {
        vendor_id: Uuid::parse_str(&vendor_id).context("Bad vendor id")?,
        product_id: Uuid::parse_str(&product_id).context("Bad product id")?,
        price: Decimal::from_str(&price).unwrap_or_default(),
        stock: Decimal::from_str(&stock).unwrap_or_default(),
        is_available,
        min_order_qty: Decimal::from_str(&min_qty).unwrap_or_default(),
        max_order_qty: Decimal::from_str(&max_qty).unwrap_or_default(),
        updated_at,
    })
}

#[async_trait]
impl VendorRepository for SqliteVendorRepository {
    async fn find(&self, id: VendorId) -> Result<Option<Vendor>> {
        let row = sqlx::query_as::<_, VendorRow>(&format!(
            "SELECT {} FROM vendors WHERE id = $1",
            VENDOR_FIELDS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to load vendor")?;

        row.map(row_to_vendor).transpose()
    }

    async fn insert(&self, vendor: &Vendor, listings: &[VendorProduct]) -> Result<()> {
        let mut tx = self.database.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO vendors (
                id, name, phone, is_approved, is_active, reliability_score,
                work_start, work_end, utc_offset_minutes, max_active_orders,
                max_pending_orders, delivery_zones, district, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(vendor.id.to_string())
        .bind(&vendor.name)
        .bind(&vendor.phone)
        .bind(vendor.is_approved)
        .bind(vendor.is_active)
        .bind(vendor.reliability_score.to_string())
        .bind(vendor.working_hours.start.to_string())
        .bind(vendor.working_hours.end.to_string())
        .bind(vendor.working_hours.utc_offset_minutes as i64)
        .bind(vendor.max_active_orders as i64)
        .bind(vendor.max_pending_orders as i64)
        .bind(serde_json::to_string(&vendor.delivery_zones)?)
        .bind(&vendor.district)
        .bind(vendor.created_at)
        .execute(&mut *tx)
        .await
        .context("Failed to insert vendor")?;

        for listing in listings {
            sqlx::query(
                r#"
                INSERT INTO vendor_products (
                    vendor_id, product_id, price, stock, is_available,
                    min_order_qty, max_order_qty, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(listing.vendor_id.to_string())
            .bind(listing.product_id.to_string())
            .bind(listing.price.to_string())
            .bind(listing.stock.to_string())
            .bind(listing.is_available)
            .bind(listing.min_order_qty.to_string())
            .bind(listing.max_order_qty.to_string())
            .bind(listing.updated_at)
            .execute(&mut *tx)
            .await
            .context("Failed to insert vendor listing")?;
        }

        tx.commit().await.context("Failed to commit vendor insert")?;
        Ok(())
    }

    async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<(Vendor, VendorProduct)>> {
        let listings = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT vendor_id, product_id, price, stock, is_available,
                   min_order_qty, max_order_qty, updated_at
            FROM vendor_products
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.to_string())
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to load listings for product")?;

        let mut result = Vec::with_capacity(listings.len());
        for row in listings {
            let listing = row_to_listing(row)?;
            if let Some(vendor) = self.find(listing.vendor_id).await? {
                result.push((vendor, listing));
            }
        }
        Ok(result)
    }

    async fn listings_for_vendor(&self, vendor_id: VendorId) -> Result<Vec<VendorProduct>> {
        let rows = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT vendor_id, product_id, price, stock, is_available,
                   min_order_qty, max_order_qty, updated_at
            FROM vendor_products
            WHERE vendor_id = $1
            "#,
        )
        .bind(vendor_id.to_string())
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to load vendor listings")?;

        rows.into_iter().map(row_to_listing).collect()
    }

    async fn set_reliability(&self, id: VendorId, score: Decimal) -> Result<()> {
        sqlx::query("UPDATE vendors SET reliability_score = $2 WHERE id = $1")
            .bind(id.to_string())
            .bind(score.to_string())
            .execute(&self.database.pool)
            .await
            .context("Failed to update reliability score")?;
        Ok(())
    }

    async fn set_price(
        &self,
        vendor_id: VendorId,
        product_id: ProductId,
        new_price: Decimal,
    ) -> Result<Decimal> {
        let mut tx = self.database.pool.begin().await?;

        let row: Option<(String,)> = sqlx::query_as(
            "SELECT price FROM vendor_products WHERE vendor_id = $1 AND product_id = $2",
        )
        .bind(vendor_id.to_string())
        .bind(product_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to load current price")?;

        let old_price = match row {
            Some((price,)) => Decimal::from_str(&price).unwrap_or_default(),
            None => anyhow::bail!(
                "No listing for vendor {} product {}",
                vendor_id,
                product_id
            ),
        };

        sqlx::query(
            r#"
            UPDATE vendor_products
            SET price = $3, updated_at = $4
            WHERE vendor_id = $1 AND product_id = $2
            "#,
        )
        .bind(vendor_id.to_string())
        .bind(product_id.to_string())
        .bind(new_price.to_string())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("Failed to update price")?;

        tx.commit().await.context("Failed to commit price update")?;
        Ok(old_price)
    }

    async fn list_ids(&self) -> Result<Vec<VendorId>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM vendors")
            .fetch_all(&self.database.pool)
            .await
            .context("Failed to list vendor ids")?;
        rows.into_iter()
            .map(|(id,)| Uuid::parse_str(&id).context("Bad vendor id"))
            .collect()
    }
}
