// src/models/shop.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::common::validation::validate_not_negative;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Suspended,
}

// ---
// 1. ButcherShop (O Tenant)
// ---
// `subscription_status` é só uma projeção em cache: o predicado real
// vive em services::subscription_service::check.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ButcherShop {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub owner_id: Option<Uuid>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub subscription_plan_id: Option<Uuid>,
    pub subscription_start: Option<NaiveDate>,
    pub subscription_end: Option<NaiveDate>,
    pub subscription_status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---
// 2. Plan (Plano de assinatura)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub duration_days: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanWithUsage {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub plan: Plan,
    pub butcher_shops_count: i64,
}

// ---
// 3. PlatformPayment (Pagamento da loja para a plataforma)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformPayment {
    pub id: Uuid,
    pub butcher_id: Uuid,
    pub plan_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_method: Option<String>,
    pub reference_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Motivo pelo qual a assinatura não está ativa
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionDenial {
    Suspended,
    Expired,
}

// Resposta de `checkSubscription`
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCheck {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SubscriptionDenial>,
    pub status: SubscriptionStatus,
    pub plan_id: Option<Uuid>,
    pub subscription_start: Option<NaiveDate>,
    pub subscription_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShopStats {
    pub total_users: i64,
    pub total_products: i64,
    pub total_sales: i64,
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShopDetail {
    pub butcher_shop: ButcherShop,
    pub plan: Option<Plan>,
    pub stats: ShopStats,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShopFilter {
    pub status: Option<SubscriptionStatus>,
    pub search: Option<String>,
}

// ---
// Payloads
// ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateShopPayload {
    #[validate(length(min = 1, max = 255, message = "O nome da loja é obrigatório."))]
    pub shop_name: String,
    #[validate(length(max = 50))]
    pub shop_phone: Option<String>,
    #[validate(length(max = 500))]
    pub shop_address: Option<String>,
    #[validate(length(min = 1, max = 255, message = "O nome do dono é obrigatório."))]
    pub owner_name: String,
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub owner_email: String,
    #[validate(length(min = 6, message = "A senha deve ter no mínimo 6 caracteres."))]
    pub owner_password: String,
    pub plan_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShopPayload {
    #[validate(length(min = 1, max = 255, message = "O nome da loja não pode ser vazio."))]
    pub name: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanPayload {
    #[validate(length(min = 1, max = 255, message = "O nome do plano é obrigatório."))]
    pub name: String,
    #[validate(custom(function = "validate_not_negative"))]
    pub price: Decimal,
    #[validate(range(min = 1, max = 36500, message = "A duração deve ficar entre 1 e 36500 dias."))]
    pub duration_days: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanPayload {
    #[validate(length(min = 1, max = 255, message = "O nome do plano não pode ser vazio."))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_not_negative"))]
    pub price: Option<Decimal>,
    #[validate(range(min = 1, max = 36500, message = "A duração deve ficar entre 1 e 36500 dias."))]
    pub duration_days: Option<i32>,
}

// `plan_id` é opcional no JSON para podermos responder "plano obrigatório"
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanSelectionPayload {
    pub plan_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ExtendSubscriptionPayload {
    #[validate(range(min = 1, max = 36500, message = "Informe entre 1 e 36500 dias."))]
    pub days: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentPayload {
    pub plan_id: Uuid,
    #[validate(custom(function = "validate_not_negative"))]
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_method: Option<String>,
    pub reference_number: Option<String>,
    #[serde(default = "default_true")]
    pub activate_subscription: bool,
}

fn default_true() -> bool {
    true
}
