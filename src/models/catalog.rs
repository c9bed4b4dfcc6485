// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::common::validation::validate_not_negative;

// --- Produtos (cortes de carne vendidos por kg) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub butcher_id: Uuid,
    pub name: String,
    pub price_per_kg: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    #[validate(length(min = 1, max = 255, message = "O nome é obrigatório."))]
    pub name: String,
    #[validate(custom(function = "validate_not_negative"))]
    pub price_per_kg: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductPayload {
    #[validate(length(min = 1, max = 255, message = "O nome não pode ser vazio."))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_not_negative"))]
    pub price_per_kg: Option<Decimal>,
    pub is_active: Option<bool>,
}

fn default_active() -> bool {
    true
}

// --- Dispositivos (caixas registrados) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: Uuid,
    pub butcher_id: Uuid,
    pub device_id: String,
    pub name: Option<String>,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDevicePayload {
    #[validate(length(min = 1, max = 255, message = "O identificador do dispositivo é obrigatório."))]
    pub device_id: String,
    pub name: Option<String>,
}
