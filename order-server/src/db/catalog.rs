//! Catalog reads (products and option values)

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{CatalogOptionValue, CatalogProduct, CatalogReader, StorageError};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    price: Decimal,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct OptionValueRow {
    id: i64,
    option_id: i64,
    product_id: i64,
    option_name: String,
    name: String,
    price_adjustment: Decimal,
}

/// PostgreSQL-backed catalog
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogReader for PgCatalog {
    async fn products_by_ids(&self, ids: &[i64]) -> Result<Vec<CatalogProduct>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ProductRow> = sqlx::query_as(
            "SELECT id, name, price, is_active FROM products WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CatalogProduct {
                id: r.id,
                name: r.name,
                price: r.price,
                is_active: r.is_active,
            })
            .collect())
    }

    async fn option_values_by_ids(
        &self,
        ids: &[i64],
    ) -> Result<Vec<CatalogOptionValue>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<OptionValueRow> = sqlx::query_as(
            r#"
            SELECT v.id, v.option_id, o.product_id, o.name AS option_name, v.name, v.price_adjustment
            FROM product_option_values v
            JOIN product_options o ON o.id = v.option_id
            WHERE v.id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CatalogOptionValue {
                id: r.id,
                option_id: r.option_id,
                product_id: r.product_id,
                option_name: r.option_name,
                name: r.name,
                price_adjustment: r.price_adjustment,
            })
            .collect())
    }
}
