// src/db/shop_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        dashboard::AdminDashboard,
        sales::Sale,
        shop::{ButcherShop, Plan, PlanWithUsage, PlatformPayment, ShopFilter, ShopStats},
    },
};

#[derive(Clone)]
pub struct ShopRepository {
    pool: PgPool,
}

impl ShopRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---
    // Lojas
    // ---

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<ButcherShop>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let shop = sqlx::query_as::<_, ButcherShop>("SELECT * FROM butcher_shops WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(shop)
    }

    /// Mesma busca, mas trava a linha até o fim da transação.
    pub async fn find_for_update<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<ButcherShop>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let shop = sqlx::query_as::<_, ButcherShop>(
            "SELECT * FROM butcher_shops WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(shop)
    }

    pub async fn list(&self, filter: &ShopFilter) -> Result<Vec<ButcherShop>, AppError> {
        let search = filter.search.as_ref().map(|s| format!("%{}%", s));
        let shops = sqlx::query_as::<_, ButcherShop>(
            r#"
            SELECT s.* FROM butcher_shops s
            LEFT JOIN users o ON o.id = s.owner_id
            WHERE ($1::subscription_status IS NULL OR s.subscription_status = $1)
              AND ($2::text IS NULL OR s.name ILIKE $2 OR o.name ILIKE $2 OR o.email ILIKE $2)
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(filter.status)
        .bind(search)
        .fetch_all(&self.pool)
        .await?;
        Ok(shops)
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        name: &str,
        phone: Option<&str>,
        address: Option<&str>,
        owner_id: Uuid,
        api_key: &str,
    ) -> Result<ButcherShop, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let shop = sqlx::query_as::<_, ButcherShop>(
            r#"
            INSERT INTO butcher_shops (name, phone, address, owner_id, api_key, subscription_status)
            VALUES ($1, $2, $3, $4, $5, 'expired')
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(phone)
        .bind(address)
        .bind(owner_id)
        .bind(api_key)
        .fetch_one(executor)
        .await?;
        Ok(shop)
    }

    pub async fn update_contact(
        &self,
        id: Uuid,
        name: Option<&str>,
        phone: Option<&str>,
        address: Option<&str>,
    ) -> Result<Option<ButcherShop>, AppError> {
        let shop = sqlx::query_as::<_, ButcherShop>(
            r#"
            UPDATE butcher_shops
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                address = COALESCE($4, address),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(phone)
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(shop)
    }

    /// Grava os campos de assinatura calculados pelo serviço.
    pub async fn save_subscription<'e, E>(&self, executor: E, shop: &ButcherShop) -> Result<ButcherShop, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let saved = sqlx::query_as::<_, ButcherShop>(
            r#"
            UPDATE butcher_shops
            SET subscription_plan_id = $2,
                subscription_start = $3,
                subscription_end = $4,
                subscription_status = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(shop.id)
        .bind(shop.subscription_plan_id)
        .bind(shop.subscription_start)
        .bind(shop.subscription_end)
        .bind(shop.subscription_status)
        .fetch_one(executor)
        .await?;
        Ok(saved)
    }

    pub async fn set_api_key(&self, id: Uuid, api_key: &str) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE butcher_shops SET api_key = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(api_key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a loja; usuários, vendas, sessões e licença caem em cascata.
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM butcher_shops WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn stats(&self, id: Uuid) -> Result<ShopStats, AppError> {
        let stats = sqlx::query_as::<_, ShopStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE butcher_id = $1) AS total_users,
                (SELECT COUNT(*) FROM products WHERE butcher_id = $1) AS total_products,
                (SELECT COUNT(*) FROM sales WHERE butcher_id = $1) AS total_sales,
                (SELECT COALESCE(SUM(total_amount), 0) FROM sales WHERE butcher_id = $1) AS total_revenue
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    pub async fn list_sales(
        &self,
        id: Uuid,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Result<Vec<Sale>, AppError> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE butcher_id = $1
              AND ($2::date IS NULL OR sale_date::date >= $2)
              AND ($3::date IS NULL OR sale_date::date <= $3)
            ORDER BY sale_date DESC
            "#,
        )
        .bind(id)
        .bind(date_from)
        .bind(date_to)
        .fetch_all(&self.pool)
        .await?;
        Ok(sales)
    }

    // ---
    // Planos
    // ---

    pub async fn find_plan<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Plan>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(plan)
    }

    pub async fn list_plans(&self) -> Result<Vec<PlanWithUsage>, AppError> {
        let plans = sqlx::query_as::<_, PlanWithUsage>(
            r#"
            SELECT p.*,
                   (SELECT COUNT(*) FROM butcher_shops s WHERE s.subscription_plan_id = p.id) AS butcher_shops_count
            FROM plans p
            ORDER BY p.duration_days ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(plans)
    }

    pub async fn create_plan(&self, name: &str, price: Decimal, duration_days: i32) -> Result<Plan, AppError> {
        let plan = sqlx::query_as::<_, Plan>(
            "INSERT INTO plans (name, price, duration_days) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(name)
        .bind(price)
        .bind(duration_days)
        .fetch_one(&self.pool)
        .await?;
        Ok(plan)
    }

    pub async fn update_plan<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        name: Option<&str>,
        price: Option<Decimal>,
        duration_days: Option<i32>,
    ) -> Result<Option<Plan>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let plan = sqlx::query_as::<_, Plan>(
            r#"
            UPDATE plans
            SET name = COALESCE($2, name),
                price = COALESCE($3, price),
                duration_days = COALESCE($4, duration_days),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(price)
        .bind(duration_days)
        .fetch_optional(executor)
        .await?;
        Ok(plan)
    }

    pub async fn plan_has_shops<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM butcher_shops WHERE subscription_plan_id = $1)",
        )
        .bind(id)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    pub async fn plan_has_payments<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM platform_payments WHERE plan_id = $1)",
        )
        .bind(id)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    pub async fn delete_plan<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM plans WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---
    // Pagamentos da plataforma
    // ---

    pub async fn insert_payment<'e, E>(
        &self,
        executor: E,
        butcher_id: Uuid,
        plan_id: Uuid,
        amount: Decimal,
        payment_date: NaiveDate,
        payment_method: Option<&str>,
        reference_number: Option<&str>,
    ) -> Result<PlatformPayment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, PlatformPayment>(
            r#"
            INSERT INTO platform_payments (butcher_id, plan_id, amount, payment_date, payment_method, reference_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(butcher_id)
        .bind(plan_id)
        .bind(amount)
        .bind(payment_date)
        .bind(payment_method)
        .bind(reference_number)
        .fetch_one(executor)
        .await?;
        Ok(payment)
    }

    pub async fn list_payments(&self) -> Result<Vec<PlatformPayment>, AppError> {
        let payments = sqlx::query_as::<_, PlatformPayment>(
            "SELECT * FROM platform_payments ORDER BY payment_date DESC, created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    pub async fn dashboard(&self) -> Result<AdminDashboard, AppError> {
        let (total_shops, active_shops, expired_shops, suspended_shops): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       COUNT(*) FILTER (WHERE subscription_status = 'active'),
                       COUNT(*) FILTER (WHERE subscription_status = 'expired'),
                       COUNT(*) FILTER (WHERE subscription_status = 'suspended')
                FROM butcher_shops
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        let total_sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        let platform_revenue: Decimal =
            sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM platform_payments")
                .fetch_one(&self.pool)
                .await?;

        Ok(AdminDashboard {
            total_shops,
            active_shops,
            expired_shops,
            suspended_shops,
            total_sales,
            platform_revenue,
        })
    }
}
