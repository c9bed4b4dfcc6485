// src/db/store.rs
//
// Contratos de armazenamento do núcleo (sincronização + licença).
// Cada método que grava é uma unidade atômica: ou tudo, ou nada.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        license::{CodeFilter, CodeStats, License, UnlockCode},
        sales::{InsertOutcome, NewSale, SaleDetail, SaleFilter},
        stock::{CloseSession, OpenSession, SessionFilter, StockSession, StockSessionDetail},
    },
};

/// Verificações de referência dentro da loja (produtos e operadores de outra
/// loja são tratados como inexistentes).
#[async_trait]
pub trait TenantScope: Send + Sync {
    /// Nome atual no catálogo de cada produto de `ids` que pertence à loja.
    async fn product_names(
        &self,
        butcher_id: Uuid,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, String>, AppError>;

    async fn user_in_shop(&self, butcher_id: Uuid, user_id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait SaleStore: TenantScope {
    async fn find_by_device_sale_id(
        &self,
        butcher_id: Uuid,
        device_sale_id: &str,
    ) -> Result<Option<SaleDetail>, AppError>;

    /// Venda + itens + incremento da licença numa única transação.
    /// Se a chave de idempotência já existe, devolve a venda vencedora.
    async fn insert_metered(&self, sale: &NewSale) -> Result<InsertOutcome, AppError>;

    async fn list(&self, butcher_id: Uuid, filter: &SaleFilter) -> Result<Vec<SaleDetail>, AppError>;

    async fn get(&self, butcher_id: Uuid, sale_id: Uuid) -> Result<Option<SaleDetail>, AppError>;
}

#[async_trait]
pub trait StockStore: TenantScope {
    async fn open(&self, session: &OpenSession) -> Result<StockSession, AppError>;

    /// Localiza (ou cria já fechada) a sessão pela chave local e substitui
    /// todas as suas movimentações. Atômico.
    async fn close(&self, close: &CloseSession) -> Result<StockSession, AppError>;

    async fn list(
        &self,
        butcher_id: Uuid,
        filter: &SessionFilter,
    ) -> Result<Vec<StockSessionDetail>, AppError>;
}

#[derive(Debug, Clone)]
pub struct NewUnlockCode {
    pub code: String,
    pub butcher_id: Option<Uuid>,
    pub additional_payments: i64,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Resultado de tentar apagar um código.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeDeletion {
    Deleted,
    AlreadyUsed,
    Missing,
}

#[async_trait]
pub trait LicenseStore: Send + Sync {
    /// Upsert atômico: no máximo uma licença por loja.
    async fn get_or_create(&self, butcher_id: Uuid) -> Result<License, AppError>;

    /// Reivindica o código (só se ainda não usado e não expirado) e soma o
    /// limite da licença na mesma transação. `None` = código inválido.
    async fn redeem(
        &self,
        butcher_id: Uuid,
        code: &str,
        strict: bool,
    ) -> Result<Option<(License, UnlockCode)>, AppError>;

    /// `None` quando o código colide com um existente.
    async fn insert_code(&self, code: &NewUnlockCode) -> Result<Option<UnlockCode>, AppError>;

    async fn list_codes(&self, filter: &CodeFilter) -> Result<Vec<UnlockCode>, AppError>;

    async fn code_stats(&self) -> Result<CodeStats, AppError>;

    async fn delete_unused_code(&self, code_id: Uuid) -> Result<CodeDeletion, AppError>;
}
