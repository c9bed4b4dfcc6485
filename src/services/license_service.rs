// src/services/license_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::{db_utils::random_token, error::AppError},
    db::{
        store::{CodeDeletion, NewUnlockCode},
        LicenseStore,
    },
    models::license::{
        CodeFilter, CodeListing, GenerateCodesPayload, License, UnlockCode, UnlockOutcome,
    },
    services::notification_service::NotificationSink,
};

const UNLOCK_CODE_LENGTH: usize = 8;
// Colisões de 8 caracteres são raras; desistimos depois de algumas
const MAX_CODE_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct LicenseService {
    store: Arc<dyn LicenseStore>,
    notifier: Arc<dyn NotificationSink>,
    strict_codes: bool,
}

impl LicenseService {
    pub fn new(store: Arc<dyn LicenseStore>, notifier: Arc<dyn NotificationSink>, strict_codes: bool) -> Self {
        Self { store, notifier, strict_codes }
    }

    /// Cria a licença padrão no primeiro acesso.
    pub async fn get_or_create(&self, butcher_id: Uuid) -> Result<License, AppError> {
        self.store.get_or_create(butcher_id).await
    }

    /// Resgata um código de uso único. `phone` é o destino do aviso, se houver.
    pub async fn redeem(
        &self,
        butcher_id: Uuid,
        raw_code: &str,
        phone: Option<&str>,
    ) -> Result<UnlockOutcome, AppError> {
        let code = raw_code.trim().to_uppercase();
        if code.is_empty() {
            return Err(AppError::InvalidUnlockCode);
        }

        // Garante a linha antes do UPDATE que soma o limite
        self.store.get_or_create(butcher_id).await?;

        let Some((license, claimed)) = self.store.redeem(butcher_id, &code, self.strict_codes).await? else {
            tracing::warn!(butcher_id = %butcher_id, code = %code, "Código de desbloqueio recusado");
            return Err(AppError::InvalidUnlockCode);
        };

        tracing::info!(
            butcher_id = %butcher_id,
            code = %claimed.code,
            new_limit = license.payment_limit,
            "Licença desbloqueada"
        );

        if let Some(phone) = phone {
            let message = format!(
                "Your license has been unlocked! Code: {}. You now have {} additional payments added to your account.",
                claimed.code, claimed.additional_payments
            );
            if !self.notifier.send(phone, &message).await {
                tracing::warn!(butcher_id = %butcher_id, "Falha ao enviar aviso de desbloqueio");
            }
        }

        Ok(UnlockOutcome {
            new_limit: license.payment_limit,
            remaining: license.remaining(),
            license: license.view(),
        })
    }

    /// Gera um lote de códigos; se houver loja, avisa o telefone dela.
    pub async fn generate_codes(
        &self,
        payload: &GenerateCodesPayload,
        shop_phone: Option<&str>,
    ) -> Result<Vec<UnlockCode>, AppError> {
        let mut created = Vec::with_capacity(payload.quantity as usize);

        for _ in 0..payload.quantity {
            let mut saved = None;
            for _ in 0..MAX_CODE_ATTEMPTS {
                let candidate = NewUnlockCode {
                    code: random_token(UNLOCK_CODE_LENGTH),
                    butcher_id: payload.butcher_id,
                    additional_payments: payload.additional_payments,
                    expires_at: payload.expires_at,
                };
                if let Some(code) = self.store.insert_code(&candidate).await? {
                    saved = Some(code);
                    break;
                }
            }
            let code = saved.ok_or_else(|| anyhow::anyhow!("Não foi possível gerar um código único"))?;
            created.push(code);
        }

        tracing::info!(
            quantity = created.len(),
            additional_payments = payload.additional_payments,
            butcher_id = ?payload.butcher_id,
            "Códigos de desbloqueio gerados"
        );

        if let (Some(_), Some(phone)) = (payload.butcher_id, shop_phone) {
            let codes: Vec<&str> = created.iter().map(|c| c.code.as_str()).collect();
            let message = format!(
                "New unlock codes for your account: {}. Each adds {} payments.",
                codes.join(", "),
                payload.additional_payments
            );
            self.notifier.send(phone, &message).await;
        }

        Ok(created)
    }

    pub async fn list_codes(&self, filter: &CodeFilter) -> Result<CodeListing, AppError> {
        let unlock_codes = self.store.list_codes(filter).await?;
        let stats = self.store.code_stats().await?;
        Ok(CodeListing { unlock_codes, stats })
    }

    pub async fn delete_code(&self, code_id: Uuid) -> Result<(), AppError> {
        match self.store.delete_unused_code(code_id).await? {
            CodeDeletion::Deleted => Ok(()),
            CodeDeletion::Missing => Err(AppError::NotFound("Código")),
            CodeDeletion::AlreadyUsed => Err(AppError::invalid(
                "code",
                "Códigos já utilizados não podem ser removidos.",
            )),
        }
    }
}
