// src/db/stock_repo.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        store::{StockStore, TenantScope},
        ProductRepository, UserRepository,
    },
    models::stock::{
        CloseSession, NewStockMovement, OpenSession, SessionFilter, StockMovement, StockSession,
        StockSessionDetail, StockSessionStatus,
    },
};

#[derive(Clone)]
pub struct StockRepository {
    pool: PgPool,
    products: ProductRepository,
    users: UserRepository,
}

impl StockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            products: ProductRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            pool,
        }
    }

    async fn insert_session<'e, E>(
        &self,
        executor: E,
        butcher_id: Uuid,
        user_id: Uuid,
        local_session_id: Option<i64>,
        status: StockSessionStatus,
        opened_at: DateTime<Utc>,
        closed_at: Option<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> Result<StockSession, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let session = sqlx::query_as::<_, StockSession>(
            r#"
            INSERT INTO stock_sessions (butcher_id, user_id, local_session_id, status, opened_at, closed_at, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(butcher_id)
        .bind(user_id)
        .bind(local_session_id)
        .bind(status)
        .bind(opened_at)
        .bind(closed_at)
        .bind(notes)
        .fetch_one(executor)
        .await?;
        Ok(session)
    }

    async fn insert_movement<'e, E>(
        &self,
        executor: E,
        session_id: Uuid,
        movement: &NewStockMovement,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (session_id, product_id, product_name, opening_grams,
                                         sold_grams, closing_grams, expected_closing_grams, variance_grams)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session_id)
        .bind(movement.product_id)
        .bind(&movement.product_name)
        .bind(movement.opening_grams)
        .bind(movement.sold_grams)
        .bind(movement.closing_grams)
        .bind(movement.expected_closing_grams)
        .bind(movement.variance_grams)
        .execute(executor)
        .await?;
        Ok(())
    }

    async fn movements_for(&self, session_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<StockMovement>>, AppError> {
        let movements = sqlx::query_as::<_, StockMovement>(
            "SELECT * FROM stock_movements WHERE session_id = ANY($1) ORDER BY product_name",
        )
        .bind(session_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<StockMovement>> = HashMap::new();
        for movement in movements {
            grouped.entry(movement.session_id).or_default().push(movement);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl TenantScope for StockRepository {
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
impl StockStore for StockRepository {
    async fn open(&self, open: &OpenSession) -> Result<StockSession, AppError> {
        let mut tx = self.pool.begin().await?;

        let session = self
            .insert_session(
                &mut *tx,
                open.butcher_id,
                open.user_id,
                open.local_session_id,
                StockSessionStatus::Open,
                open.opened_at,
                None,
                None,
            )
            .await?;

        for movement in &open.movements {
            self.insert_movement(&mut *tx, session.id, movement).await?;
        }

        tx.commit().await?;
        Ok(session)
    }

    async fn close(&self, close: &CloseSession) -> Result<StockSession, AppError> {
        // 1. Inicia a transação
        let mut tx = self.pool.begin().await?;

        // 2. Serializa fechamentos concorrentes da mesma sessão local
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text || ':' || $2::text))")
            .bind(close.butcher_id)
            .bind(close.local_session_id)
            .execute(&mut *tx)
            .await?;

        // 3. Sessão mais recente com essa chave
        let existing = sqlx::query_as::<_, StockSession>(
            r#"
            SELECT * FROM stock_sessions
            WHERE butcher_id = $1 AND local_session_id = $2
            ORDER BY opened_at DESC, created_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(close.butcher_id)
        .bind(close.local_session_id)
        .fetch_optional(&mut *tx)
        .await?;

        // 4. Atualiza no lugar, ou cria já fechada (abertura nunca chegou)
        let session = match existing {
            Some(found) => {
                let updated = sqlx::query_as::<_, StockSession>(
                    r#"
                    UPDATE stock_sessions
                    SET status = 'closed',
                        closed_at = $2,
                        notes = $3,
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(found.id)
                .bind(close.closed_at)
                .bind(close.notes.as_deref())
                .fetch_one(&mut *tx)
                .await?;

                sqlx::query("DELETE FROM stock_movements WHERE session_id = $1")
                    .bind(found.id)
                    .execute(&mut *tx)
                    .await?;

                updated
            }
            None => {
                self.insert_session(
                    &mut *tx,
                    close.butcher_id,
                    close.user_id,
                    Some(close.local_session_id),
                    StockSessionStatus::Closed,
                    close.opened_at,
                    Some(close.closed_at),
                    close.notes.as_deref(),
                )
                .await?
            }
        };

        // 5. O conjunto do fechamento substitui o anterior
        for movement in &close.movements {
            self.insert_movement(&mut *tx, session.id, movement).await?;
        }

        tx.commit().await?;
        Ok(session)
    }

    async fn list(
        &self,
        butcher_id: Uuid,
        filter: &SessionFilter,
    ) -> Result<Vec<StockSessionDetail>, AppError> {
        let sessions = sqlx::query_as::<_, StockSession>(
            r#"
            SELECT * FROM stock_sessions
            WHERE butcher_id = $1
              AND ($2::stock_session_status IS NULL OR status = $2)
              AND ($3::date IS NULL OR opened_at::date >= $3)
              AND ($4::date IS NULL OR opened_at::date <= $4)
            ORDER BY opened_at DESC
            "#,
        )
        .bind(butcher_id)
        .bind(filter.status)
        .bind(filter.from_date)
        .bind(filter.to_date)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = sessions.iter().map(|s| s.id).collect();
        let mut movements = self.movements_for(&ids).await?;

        Ok(sessions
            .into_iter()
            .map(|session| {
                let items = movements.remove(&session.id).unwrap_or_default();
                StockSessionDetail::new(session, items)
            })
            .collect())
    }
}
