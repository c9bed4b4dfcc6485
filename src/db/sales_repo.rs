// src/db/sales_repo.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        store::{SaleStore, TenantScope},
        LicenseRepository, ProductRepository, UserRepository,
    },
    models::sales::{
        InsertOutcome, NewSale, NewSaleItem, Sale, SaleDetail, SaleFilter, SaleItem, SaleKey,
    },
};

#[derive(Clone)]
pub struct SalesRepository {
    pool: PgPool,
    products: ProductRepository,
    users: UserRepository,
    licenses: LicenseRepository,
}

impl SalesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            products: ProductRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            licenses: LicenseRepository::new(pool.clone()),
            pool,
        }
    }

    // ---
    // Funções de "Escrita" (Transacionais)
    // ---

    /// Insere o cabeçalho da venda. `None` quando a venda já existe por
    /// qualquer uma das chaves únicas (`device_sale_id` ou `sale_number`).
    async fn insert_sale<'e, E>(&self, executor: E, sale: &NewSale) -> Result<Option<Sale>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Sem alvo: o conflito em qualquer índice único vira "já existe"
        let inserted = sqlx::query_as::<_, Sale>(
            r#"
            INSERT INTO sales (butcher_id, user_id, device_sale_id, sale_number,
                               total_amount, payment_method, sale_date, synced_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(sale.butcher_id)
        .bind(sale.user_id)
        .bind(sale.device_sale_id())
        .bind(sale.sale_number.as_deref())
        .bind(sale.total_amount)
        .bind(&sale.payment_method)
        .bind(sale.sale_date)
        .fetch_optional(executor)
        .await?;
        Ok(inserted)
    }

    async fn insert_item<'e, E>(
        &self,
        executor: E,
        sale_id: Uuid,
        item: &NewSaleItem,
    ) -> Result<SaleItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let saved = sqlx::query_as::<_, SaleItem>(
            r#"
            INSERT INTO sale_items (sale_id, product_id, product_name, weight_grams, price_per_kg, total_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(sale_id)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(item.weight_grams)
        .bind(item.price_per_kg)
        .bind(item.total_price)
        .fetch_one(executor)
        .await?;
        Ok(saved)
    }

    // ---
    // Funções de "Leitura"
    // ---

    async fn find_by_key<'e, E>(&self, executor: E, butcher_id: Uuid, key: &SaleKey) -> Result<Option<Sale>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (sql, value) = match key {
            SaleKey::DeviceSaleId(v) => ("SELECT * FROM sales WHERE butcher_id = $1 AND device_sale_id = $2", v),
            SaleKey::SaleNumber(v) => ("SELECT * FROM sales WHERE butcher_id = $1 AND sale_number = $2", v),
        };
        let sale = sqlx::query_as::<_, Sale>(sql)
            .bind(butcher_id)
            .bind(value)
            .fetch_optional(executor)
            .await?;
        Ok(sale)
    }

    /// A venda que barrou a inserção: primeiro pela chave da requisição,
    /// depois pelo `sale_number` informado.
    async fn find_existing(&self, sale: &NewSale) -> Result<Option<Sale>, AppError> {
        if let Some(found) = self.find_by_key(&self.pool, sale.butcher_id, &sale.key).await? {
            return Ok(Some(found));
        }
        match &sale.sale_number {
            Some(number) => {
                let key = SaleKey::SaleNumber(number.clone());
                self.find_by_key(&self.pool, sale.butcher_id, &key).await
            }
            None => Ok(None),
        }
    }

    /// Itens de várias vendas numa só consulta, agrupados por venda.
    async fn items_for(&self, sale_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<SaleItem>>, AppError> {
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT * FROM sale_items WHERE sale_id = ANY($1) ORDER BY id",
        )
        .bind(sale_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<SaleItem>> = HashMap::new();
        for item in items {
            grouped.entry(item.sale_id).or_default().push(item);
        }
        Ok(grouped)
    }

    async fn with_items(&self, sales: Vec<Sale>) -> Result<Vec<SaleDetail>, AppError> {
        let ids: Vec<Uuid> = sales.iter().map(|s| s.id).collect();
        let mut items = self.items_for(&ids).await?;
        Ok(sales
            .into_iter()
            .map(|sale| SaleDetail {
                items: items.remove(&sale.id).unwrap_or_default(),
                sale,
            })
            .collect())
    }

    async fn detail(&self, sale: Sale) -> Result<SaleDetail, AppError> {
        let mut details = self.with_items(vec![sale]).await?;
        details
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Venda sumiu ao carregar os itens").into())
    }
}

#[async_trait]
impl TenantScope for SalesRepository {
    async fn product_names(
        &self,
        butcher_id: Uuid,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, String>, AppError> {
        self.products.names_in_shop(butcher_id, ids).await
    }

    async fn user_in_shop(&self, butcher_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        self.users.user_in_shop(butcher_id, user_id).await
    }
}

#[async_trait]
impl SaleStore for SalesRepository {
    async fn find_by_device_sale_id(
        &self,
        butcher_id: Uuid,
        device_sale_id: &str,
    ) -> Result<Option<SaleDetail>, AppError> {
        let key = SaleKey::DeviceSaleId(device_sale_id.to_string());
        match self.find_by_key(&self.pool, butcher_id, &key).await? {
            Some(sale) => Ok(Some(self.detail(sale).await?)),
            None => Ok(None),
        }
    }

    async fn insert_metered(&self, new_sale: &NewSale) -> Result<InsertOutcome, AppError> {
        // 1. Inicia a transação
        let mut tx = self.pool.begin().await?;

        // 2. Garante a licença antes de contar
        self.licenses.ensure_license(&mut *tx, new_sale.butcher_id).await?;

        // 3. Cabeçalho (idempotente pelas duas chaves)
        let Some(sale) = self.insert_sale(&mut *tx, new_sale).await? else {
            tx.rollback().await?;
            let existing = self
                .find_existing(new_sale)
                .await?
                .ok_or(AppError::NotFound("Venda"))?;
            return Ok(InsertOutcome::Existing(self.detail(existing).await?));
        };

        // 4. Itens: se um falhar, o drop do `tx` desfaz a venda inteira
        let mut items = Vec::with_capacity(new_sale.items.len());
        for item in &new_sale.items {
            items.push(self.insert_item(&mut *tx, sale.id, item).await?);
        }

        // 5. Medidor de uso na mesma unidade
        let license = self
            .licenses
            .increment_payment_count(&mut *tx, new_sale.butcher_id)
            .await?;

        tx.commit().await?;

        tracing::info!(
            butcher_id = %new_sale.butcher_id,
            sale_id = %sale.id,
            payment_count = license.payment_count,
            locked = license.is_locked(),
            "Venda registrada"
        );

        Ok(InsertOutcome::Inserted(SaleDetail { sale, items }))
    }

    async fn list(&self, butcher_id: Uuid, filter: &SaleFilter) -> Result<Vec<SaleDetail>, AppError> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE butcher_id = $1
              AND ($2::date IS NULL OR sale_date::date >= $2)
              AND ($3::date IS NULL OR sale_date::date <= $3)
              AND ($4::uuid IS NULL OR user_id = $4)
              AND ($5::text IS NULL OR payment_method = $5)
            ORDER BY sale_date DESC
            "#,
        )
        .bind(butcher_id)
        .bind(filter.from_date)
        .bind(filter.to_date)
        .bind(filter.user_id)
        .bind(filter.payment_method.as_deref())
        .fetch_all(&self.pool)
        .await?;

        self.with_items(sales).await
    }

    async fn get(&self, butcher_id: Uuid, sale_id: Uuid) -> Result<Option<SaleDetail>, AppError> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = $1 AND butcher_id = $2")
            .bind(sale_id)
            .bind(butcher_id)
            .fetch_optional(&self.pool)
            .await?;
        match sale {
            Some(sale) => Ok(Some(self.detail(sale).await?)),
            None => Ok(None),
        }
    }
}
