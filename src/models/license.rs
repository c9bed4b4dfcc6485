// src/models/license.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Limite de pagamentos de uma licença recém-criada.
pub const DEFAULT_PAYMENT_LIMIT: i64 = 100;
pub const DEFAULT_LICENSE_PLAN: &str = "free";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "license_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Locked,
    Expired,
}

// ---
// License (O "Medidor" de uso por loja)
// ---
// Uma por loja (unique em butcher_id). `plan` é só um rótulo,
// independente do plano de assinatura.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct License {
    pub id: Uuid,
    pub butcher_id: Uuid,
    pub plan: String,
    pub status: LicenseStatus,
    pub payment_count: i64,
    pub payment_limit: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl License {
    pub fn remaining(&self) -> i64 {
        (self.payment_limit - self.payment_count).max(0)
    }

    /// Travada pelo status OU pelo contador. Nunca guarde este valor em cache.
    pub fn is_locked(&self) -> bool {
        self.status == LicenseStatus::Locked || self.payment_count >= self.payment_limit
    }

    pub fn view(&self) -> LicenseView {
        LicenseView {
            butcher_id: self.butcher_id,
            plan: self.plan.clone(),
            status: self.status,
            payment_count: self.payment_count,
            payment_limit: self.payment_limit,
            remaining: self.remaining(),
            locked: self.is_locked(),
            expires_at: self.expires_at,
        }
    }
}

// Resposta de `getLicenseStatus`
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LicenseView {
    pub butcher_id: Uuid,
    pub plan: String,
    pub status: LicenseStatus,
    pub payment_count: i64,
    pub payment_limit: i64,
    pub remaining: i64,
    pub locked: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

// ---
// UnlockCode (Código de uso único)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnlockCode {
    pub id: Uuid,
    pub code: String,
    pub butcher_id: Option<Uuid>,
    pub additional_payments: i64,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// Resultado de `redeemUnlockCode`
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnlockOutcome {
    pub new_limit: i64,
    pub remaining: i64,
    pub license: LicenseView,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedeemCodePayload {
    #[validate(length(min = 1, max = 64, message = "O código de desbloqueio é obrigatório."))]
    pub unlock_code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodesPayload {
    pub butcher_id: Option<Uuid>,
    #[validate(range(min = 1, max = 10000, message = "Entre 1 e 10000 pagamentos adicionais."))]
    pub additional_payments: i64,
    #[validate(range(min = 1, max = 100, message = "Entre 1 e 100 códigos por lote."))]
    pub quantity: u32,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeUsage {
    Used,
    Unused,
}

#[derive(Debug, Default, Deserialize)]
pub struct CodeFilter {
    pub butcher_id: Option<Uuid>,
    pub status: Option<CodeUsage>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodeStats {
    pub total_codes: i64,
    pub used_codes: i64,
    pub unused_codes: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodeListing {
    pub unlock_codes: Vec<UnlockCode>,
    pub stats: CodeStats,
}
