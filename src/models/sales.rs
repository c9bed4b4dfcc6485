// src/models/sales.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::common::validation::validate_not_negative;

/// Meios de pagamento aceitos pelo caminho de sincronização em lote.
pub const BATCH_PAYMENT_METHODS: [&str; 4] = ["cash", "ecocash", "innbucks", "swipe"];

fn validate_batch_payment_method(method: &str) -> Result<(), ValidationError> {
    if BATCH_PAYMENT_METHODS.contains(&method) {
        return Ok(());
    }
    let mut err = ValidationError::new("payment_method");
    err.message = Some("Meio de pagamento inválido (cash, ecocash, innbucks ou swipe).".into());
    Err(err)
}

// --- Venda persistida ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    pub butcher_id: Uuid,
    pub user_id: Uuid,
    pub device_sale_id: Option<String>,
    pub sale_number: Option<String>,
    pub total_amount: Decimal,
    pub payment_method: String,
    pub sale_date: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// `product_name` é um retrato do catálogo no momento da venda
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub weight_grams: i32,
    pub price_per_kg: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// Qual chave de idempotência protege a inserção
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaleKey {
    DeviceSaleId(String),
    SaleNumber(String),
}

// Venda já validada, pronta para a unidade atômica venda + itens + licença
#[derive(Debug, Clone)]
pub struct NewSale {
    pub butcher_id: Uuid,
    pub user_id: Uuid,
    pub key: SaleKey,
    pub sale_number: Option<String>,
    pub total_amount: Decimal,
    pub payment_method: String,
    pub sale_date: DateTime<Utc>,
    pub items: Vec<NewSaleItem>,
}

impl NewSale {
    pub fn device_sale_id(&self) -> Option<&str> {
        match &self.key {
            SaleKey::DeviceSaleId(id) => Some(id),
            SaleKey::SaleNumber(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSaleItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub weight_grams: i32,
    pub price_per_kg: Decimal,
    pub total_price: Decimal,
}

/// Resultado da inserção idempotente.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(SaleDetail),
    Existing(SaleDetail),
}

// ---
// Payload: venda avulsa (chave = device_sale_id)
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSalePayload {
    #[validate(length(min = 1, max = 255, message = "O campo 'deviceSaleId' é obrigatório."))]
    pub device_sale_id: String,
    pub sale_number: Option<String>,
    // Operador do caixa; se ausente, é o próprio usuário autenticado
    pub user_id: Option<Uuid>,
    #[validate(custom(function = "validate_not_negative"))]
    pub total_amount: Decimal,
    #[validate(length(min = 1, max = 50, message = "O meio de pagamento é obrigatório."))]
    pub payment_method: String,
    pub sale_date: DateTime<Utc>,
    #[validate(length(min = 1, message = "A venda precisa de pelo menos um item."), nested)]
    pub items: Vec<SaleItemPayload>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemPayload {
    pub product_id: Uuid,
    // Opcional aqui: se ausente, capturamos o nome atual do catálogo
    pub product_name: Option<String>,
    #[validate(range(min = 1, message = "O peso deve ser de pelo menos 1 grama."))]
    pub weight_grams: i32,
    #[validate(custom(function = "validate_not_negative"))]
    pub price_per_kg: Decimal,
    #[validate(custom(function = "validate_not_negative"))]
    pub total_price: Decimal,
}

// ---
// Payload: sincronização em lote (chave = sale_number)
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SyncSalesPayload {
    #[validate(length(min = 1, message = "Envie pelo menos uma venda."), nested)]
    pub sales: Vec<SyncSaleEntry>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncSaleEntry {
    // Se vier, precisa ser a loja do chamador
    pub butcher_id: Option<Uuid>,
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "O campo 'saleNumber' é obrigatório."))]
    pub sale_number: String,
    #[validate(custom(function = "validate_not_negative"))]
    pub total_amount: Decimal,
    #[validate(custom(function = "validate_batch_payment_method"))]
    pub payment_method: String,
    // Horário do evento no dispositivo
    pub created_at: DateTime<Utc>,
    #[validate(length(min = 1, message = "A venda precisa de pelo menos um item."), nested)]
    pub items: Vec<SyncItemEntry>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncItemEntry {
    pub product_id: Uuid,
    #[validate(length(min = 1, message = "O nome do produto é obrigatório."))]
    pub product_name: String,
    #[validate(range(min = 1, message = "O peso deve ser de pelo menos 1 grama."))]
    pub weight_grams: i32,
    #[validate(custom(function = "validate_not_negative"))]
    pub price_per_kg: Decimal,
    #[validate(custom(function = "validate_not_negative"))]
    pub total_price: Decimal,
}

// Resposta de `submitSaleBatch`
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub synced_count: usize,
    pub synced_sale_numbers: Vec<String>,
    pub skipped_count: usize,
    pub failed_sale_numbers: Vec<String>,
}

// ---
// Consultas e relatórios
// ---
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SaleFilter {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub user_id: Option<Uuid>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodTotal {
    pub payment_method: String,
    pub count: i64,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub total_amount: Decimal,
    pub total_transactions: usize,
    pub by_payment_method: Vec<PaymentMethodTotal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleListing {
    pub sales: Vec<SaleDetail>,
    pub summary: SalesSummary,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_report_range"))]
pub struct ReportQuery {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

fn validate_report_range(query: &ReportQuery) -> Result<(), ValidationError> {
    if query.date_to < query.date_from {
        let mut err = ValidationError::new("date_range");
        err.message = Some("'date_to' deve ser igual ou posterior a 'date_from'.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailySalesEntry {
    pub date: NaiveDate,
    pub count: i64,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub total_sales: i64,
    pub total_revenue: Decimal,
    pub by_payment_method: Vec<PaymentMethodTotal>,
    pub daily_breakdown: Vec<DailySalesEntry>,
}
