// src/db/license_repo.rs

use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{CodeDeletion, LicenseStore, NewUnlockCode},
    models::license::{
        CodeFilter, CodeStats, CodeUsage, License, UnlockCode, DEFAULT_LICENSE_PLAN,
        DEFAULT_PAYMENT_LIMIT,
    },
};

#[derive(Clone)]
pub struct LicenseRepository {
    pool: PgPool,
}

impl LicenseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Funções de "Escrita" (Transacionais)
    // ---

    /// Cria a licença padrão (free/active/0/100) se ainda não existir.
    /// O unique em butcher_id garante uma única linha mesmo com acessos concorrentes.
    pub async fn ensure_license<'e, E>(&self, executor: E, butcher_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO licenses (butcher_id, plan, payment_limit)
            VALUES ($1, $2, $3)
            ON CONFLICT (butcher_id) DO NOTHING
            "#,
        )
        .bind(butcher_id)
        .bind(DEFAULT_LICENSE_PLAN)
        .bind(DEFAULT_PAYMENT_LIMIT)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn find_by_butcher<'e, E>(
        &self,
        executor: E,
        butcher_id: Uuid,
    ) -> Result<Option<License>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let license = sqlx::query_as::<_, License>("SELECT * FROM licenses WHERE butcher_id = $1")
            .bind(butcher_id)
            .fetch_optional(executor)
            .await?;
        Ok(license)
    }

    /// Incremento atômico (o UPDATE trava a linha): nunca perde contagem
    /// quando dois dispositivos sincronizam ao mesmo tempo.
    pub async fn increment_payment_count<'e, E>(
        &self,
        executor: E,
        butcher_id: Uuid,
    ) -> Result<License, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let license = sqlx::query_as::<_, License>(
            r#"
            UPDATE licenses
            SET payment_count = payment_count + 1,
                status = CASE
                    WHEN payment_count + 1 >= payment_limit THEN 'locked'::license_status
                    ELSE status
                END,
                updated_at = NOW()
            WHERE butcher_id = $1
            RETURNING *
            "#,
        )
        .bind(butcher_id)
        .fetch_one(executor)
        .await?;
        Ok(license)
    }

    /// Reivindica o código com UPDATE condicional: só um resgate vence.
    pub async fn claim_code<'e, E>(
        &self,
        executor: E,
        butcher_id: Uuid,
        code: &str,
        strict: bool,
    ) -> Result<Option<UnlockCode>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let claimed = sqlx::query_as::<_, UnlockCode>(
            r#"
            UPDATE unlock_codes
            SET is_used = TRUE,
                used_at = NOW(),
                butcher_id = $2
            WHERE code = $1
              AND is_used = FALSE
              AND (expires_at IS NULL OR expires_at > NOW())
              AND ($3 = FALSE OR butcher_id IS NULL OR butcher_id = $2)
            RETURNING *
            "#,
        )
        .bind(code)
        .bind(butcher_id)
        .bind(strict)
        .fetch_optional(executor)
        .await?;
        Ok(claimed)
    }

    /// Soma pagamentos ao limite e destrava incondicionalmente.
    pub async fn raise_limit<'e, E>(
        &self,
        executor: E,
        butcher_id: Uuid,
        additional_payments: i64,
    ) -> Result<License, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let license = sqlx::query_as::<_, License>(
            r#"
            UPDATE licenses
            SET payment_limit = payment_limit + $2,
                status = 'active',
                updated_at = NOW()
            WHERE butcher_id = $1
            RETURNING *
            "#,
        )
        .bind(butcher_id)
        .bind(additional_payments)
        .fetch_one(executor)
        .await?;
        Ok(license)
    }
}

#[async_trait]
impl LicenseStore for LicenseRepository {
    async fn get_or_create(&self, butcher_id: Uuid) -> Result<License, AppError> {
        self.ensure_license(&self.pool, butcher_id).await?;
        self.find_by_butcher(&self.pool, butcher_id)
            .await?
            .ok_or(AppError::NotFound("Licença"))
    }

    async fn redeem(
        &self,
        butcher_id: Uuid,
        code: &str,
        strict: bool,
    ) -> Result<Option<(License, UnlockCode)>, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Reivindica o código (se outro resgate venceu, não há linha)
        let Some(claimed) = self.claim_code(&mut *tx, butcher_id, code, strict).await? else {
            return Ok(None); // rollback automático no drop
        };

        // 2. Garante a licença e soma o limite
        self.ensure_license(&mut *tx, butcher_id).await?;
        let license = self
            .raise_limit(&mut *tx, butcher_id, claimed.additional_payments)
            .await?;

        tx.commit().await?;
        Ok(Some((license, claimed)))
    }

    async fn insert_code(&self, code: &NewUnlockCode) -> Result<Option<UnlockCode>, AppError> {
        let inserted = sqlx::query_as::<_, UnlockCode>(
            r#"
            INSERT INTO unlock_codes (code, butcher_id, additional_payments, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&code.code)
        .bind(code.butcher_id)
        .bind(code.additional_payments)
        .bind(code.expires_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn list_codes(&self, filter: &CodeFilter) -> Result<Vec<UnlockCode>, AppError> {
        let is_used = filter.status.map(|s| s == CodeUsage::Used);
        let codes = sqlx::query_as::<_, UnlockCode>(
            r#"
            SELECT * FROM unlock_codes
            WHERE ($1::uuid IS NULL OR butcher_id = $1)
              AND ($2::boolean IS NULL OR is_used = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.butcher_id)
        .bind(is_used)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    async fn code_stats(&self) -> Result<CodeStats, AppError> {
        let (total_codes, used_codes): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_used) FROM unlock_codes",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(CodeStats {
            total_codes,
            used_codes,
            unused_codes: total_codes - used_codes,
        })
    }

    async fn delete_unused_code(&self, code_id: Uuid) -> Result<CodeDeletion, AppError> {
        let deleted = sqlx::query("DELETE FROM unlock_codes WHERE id = $1 AND is_used = FALSE")
            .bind(code_id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() > 0 {
            return Ok(CodeDeletion::Deleted);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM unlock_codes WHERE id = $1)")
            .bind(code_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(if exists { CodeDeletion::AlreadyUsed } else { CodeDeletion::Missing })
    }
}
