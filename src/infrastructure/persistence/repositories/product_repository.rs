use crate::domain::catalog::Product;
use crate::domain::repositories::ProductRepository;
use crate::domain::types::ProductId;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct SqliteProductRepository {
    database: Database,
}

impl SqliteProductRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

type ProductRow = (String, String, String, String, String, String, DateTime<Utc>);

fn row_to_product(row: ProductRow) -> Result<Product> {
    let (id, sku, name, category, unit, aliases, created_at) = row;
    Ok(Product {
        id: Uuid::parse_str(&id).context("Bad product id")?,
        sku,
        name,
        category,
        unit,
        aliases: serde_json::from_str(&aliases).unwrap_or_default(),
        created_at,
    })
}

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn find(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, sku, name, category, unit, aliases, created_at FROM products WHERE id = $1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.database.pool)
        .await
        .context("Failed to load product")?;

        row.map(row_to_product).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, sku, name, category, unit, aliases, created_at FROM products",
        )
        .fetch_all(&self.database.pool)
        .await
        .context("Failed to list products")?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn insert(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, category, unit, aliases, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id.to_string())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.unit)
        .bind(serde_json::to_string(&product.aliases)?)
        .bind(product.created_at)
        .execute(&self.database.pool)
        .await
        .context("Failed to insert product")?;

        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<ProductId>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM products")
            .fetch_all(&self.database.pool)
            .await
            .context("Failed to list product ids")?;
        rows.into_iter()
            .map(|(id,)| Uuid::parse_str(&id).context("Bad product id"))
            .collect()
    }
}
