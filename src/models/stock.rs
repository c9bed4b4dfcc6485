// src/models/stock.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "stock_session_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StockSessionStatus {
    Open,
    Closed,
}

// --- Sessão de contagem (abertura -> fechamento) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockSession {
    pub id: Uuid,
    pub butcher_id: Uuid,
    pub user_id: Uuid,
    // ID atribuído pelo dispositivo para correlacionar abertura e fechamento
    pub local_session_id: Option<i64>,
    pub status: StockSessionStatus,
    pub notes: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Campos de fechamento ficam nulos enquanto a sessão está aberta
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    pub session_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub opening_grams: i64,
    pub sold_grams: i64,
    pub closing_grams: Option<i64>,
    pub expected_closing_grams: Option<i64>,
    pub variance_grams: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockSessionDetail {
    #[serde(flatten)]
    pub session: StockSession,
    pub total_opening_grams: i64,
    pub total_sold_grams: i64,
    pub total_closing_grams: i64,
    pub total_variance_grams: i64,
    pub stock_movements: Vec<StockMovement>,
}

impl StockSessionDetail {
    pub fn new(session: StockSession, stock_movements: Vec<StockMovement>) -> Self {
        Self {
            total_opening_grams: stock_movements.iter().map(|m| m.opening_grams).sum(),
            total_sold_grams: stock_movements.iter().map(|m| m.sold_grams).sum(),
            total_closing_grams: stock_movements.iter().filter_map(|m| m.closing_grams).sum(),
            total_variance_grams: stock_movements.iter().filter_map(|m| m.variance_grams).sum(),
            session,
            stock_movements,
        }
    }
}

// Linha já validada para inserir em stock_movements
#[derive(Debug, Clone)]
pub struct NewStockMovement {
    pub product_id: Uuid,
    pub product_name: String,
    pub opening_grams: i64,
    pub sold_grams: i64,
    pub closing_grams: Option<i64>,
    pub expected_closing_grams: Option<i64>,
    pub variance_grams: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct OpenSession {
    pub butcher_id: Uuid,
    pub user_id: Uuid,
    pub local_session_id: Option<i64>,
    pub opened_at: DateTime<Utc>,
    pub movements: Vec<NewStockMovement>,
}

#[derive(Debug, Clone)]
pub struct CloseSession {
    pub butcher_id: Uuid,
    pub user_id: Uuid,
    pub local_session_id: i64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub movements: Vec<NewStockMovement>,
}

// ---
// Payloads
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionPayload {
    pub user_id: Option<Uuid>,
    pub local_session_id: Option<i64>,
    pub opened_at: DateTime<Utc>,
    #[validate(length(min = 1, message = "Informe pelo menos um produto."), nested)]
    pub stock_movements: Vec<OpeningMovementPayload>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpeningMovementPayload {
    pub product_id: Uuid,
    #[validate(length(min = 1, message = "O nome do produto é obrigatório."))]
    pub product_name: String,
    #[validate(range(min = 0, max = 1000000000, message = "A quantidade deve ficar entre 0 e 1000000000 gramas."))]
    pub opening_grams: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionPayload {
    pub user_id: Option<Uuid>,
    pub local_session_id: i64,
    pub notes: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    #[validate(length(min = 1, message = "Informe pelo menos um produto."), nested)]
    pub stock_movements: Vec<ClosingMovementPayload>,
}

// No fechamento o dispositivo manda o conjunto completo já calculado
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClosingMovementPayload {
    pub product_id: Uuid,
    #[validate(length(min = 1, message = "O nome do produto é obrigatório."))]
    pub product_name: String,
    #[validate(range(min = 0, max = 1000000000, message = "A quantidade deve ficar entre 0 e 1000000000 gramas."))]
    pub opening_grams: i64,
    #[validate(range(min = 0, max = 1000000000, message = "A quantidade deve ficar entre 0 e 1000000000 gramas."))]
    pub sold_grams: i64,
    #[validate(range(min = 0, max = 1000000000, message = "A quantidade deve ficar entre 0 e 1000000000 gramas."))]
    pub closing_grams: i64,
    #[validate(range(min = -1000000000, max = 1000000000, message = "Valor fora do intervalo aceito."))]
    pub expected_closing_grams: i64,
    #[validate(range(min = -1000000000, max = 1000000000, message = "Variação fora do intervalo aceito."))]
    pub variance_grams: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenOutcome {
    pub session_id: Uuid,
    pub local_session_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariance {
    pub product_id: Uuid,
    pub product_name: String,
    pub variance_grams: i64,
}

// Resposta de `closeStockSession`
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloseOutcome {
    pub session_id: Uuid,
    pub total_variance_grams: i64,
    pub variance_by_product: Vec<ProductVariance>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SessionFilter {
    pub status: Option<StockSessionStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}
