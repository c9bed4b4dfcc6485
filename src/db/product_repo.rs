// src/db/product_repo.rs

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::catalog::{Device, Product},
};

#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Produtos da loja entre `ids`, com o nome atual do catálogo.
    pub async fn names_in_shop(
        &self,
        butcher_id: Uuid,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, String>, AppError> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT id, name FROM products WHERE butcher_id = $1 AND id = ANY($2)",
        )
        .bind(butcher_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn list(&self, butcher_id: Uuid) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE butcher_id = $1 ORDER BY name ASC",
        )
        .bind(butcher_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    pub async fn create(
        &self,
        butcher_id: Uuid,
        name: &str,
        price_per_kg: Decimal,
        is_active: bool,
    ) -> Result<Product, AppError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (butcher_id, name, price_per_kg, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(butcher_id)
        .bind(name)
        .bind(price_per_kg)
        .bind(is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(product)
    }

    pub async fn update(
        &self,
        butcher_id: Uuid,
        product_id: Uuid,
        name: Option<&str>,
        price_per_kg: Option<Decimal>,
        is_active: Option<bool>,
    ) -> Result<Option<Product>, AppError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = COALESCE($3, name),
                price_per_kg = COALESCE($4, price_per_kg),
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1 AND butcher_id = $2
            RETURNING *
            "#,
        )
        .bind(product_id)
        .bind(butcher_id)
        .bind(name)
        .bind(price_per_kg)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    /// Produtos já vendidos ficam protegidos pela FK; nesse caso
    /// só desativamos.
    pub async fn delete(&self, butcher_id: Uuid, product_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1 AND butcher_id = $2")
            .bind(product_id)
            .bind(butcher_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(e) if e.as_database_error().map(|d| d.is_foreign_key_violation()).unwrap_or(false) => {
                let deactivated = self.update(butcher_id, product_id, None, None, Some(false)).await?;
                Ok(deactivated.is_some())
            }
            Err(e) => Err(e.into()),
        }
    }

    // --- Dispositivos ---

    pub async fn register_device(
        &self,
        butcher_id: Uuid,
        device_id: &str,
        name: Option<&str>,
    ) -> Result<Device, AppError> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            INSERT INTO devices (butcher_id, device_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (butcher_id, device_id)
            DO UPDATE SET name = COALESCE(EXCLUDED.name, devices.name), last_seen_at = NOW()
            RETURNING *
            "#,
        )
        .bind(butcher_id)
        .bind(device_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(device)
    }
}
