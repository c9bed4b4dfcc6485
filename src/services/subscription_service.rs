// src/services/subscription_service.rs

use chrono::{Days, NaiveDate};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{random_token, today},
        error::AppError,
    },
    db::{ShopRepository, UserRepository},
    models::{
        auth::Role,
        dashboard::AdminDashboard,
        sales::Sale,
        shop::{
            ButcherShop, CreateShopPayload, Plan, PlanPayload, PlanWithUsage, PlatformPayment,
            RecordPaymentPayload, ShopDetail, ShopFilter, SubscriptionCheck, SubscriptionDenial,
            SubscriptionStatus, UpdatePlanPayload, UpdateShopPayload,
        },
    },
    services::auth::hash_password,
};

const API_KEY_LENGTH: usize = 64;

/// Teto de dias aceito em planos e extensões (cem anos).
pub const MAX_SUBSCRIPTION_DAYS: i32 = 36_500;

// ---
// Predicado e transições de assinatura (funções puras, "hoje" injetado)
// ---

fn denial(shop: &ButcherShop, today: NaiveDate) -> Option<SubscriptionDenial> {
    match shop.subscription_status {
        SubscriptionStatus::Suspended => Some(SubscriptionDenial::Suspended),
        SubscriptionStatus::Expired => Some(SubscriptionDenial::Expired),
        SubscriptionStatus::Active => match shop.subscription_end {
            Some(end) if end < today => Some(SubscriptionDenial::Expired),
            _ => None,
        },
    }
}

/// Ativa se o status é `active` e o fim (quando existe) não passou.
pub fn is_active(shop: &ButcherShop, today: NaiveDate) -> bool {
    denial(shop, today).is_none()
}

pub fn check(shop: &ButcherShop, today: NaiveDate) -> SubscriptionCheck {
    SubscriptionCheck {
        active: is_active(shop, today),
        reason: denial(shop, today),
        status: shop.subscription_status,
        plan_id: shop.subscription_plan_id,
        subscription_start: shop.subscription_start,
        subscription_end: shop.subscription_end,
    }
}

/// `start + days`, ou erro de validação em `field` se sair do calendário.
fn add_days(start: NaiveDate, days: i32, field: &str) -> Result<NaiveDate, AppError> {
    u64::try_from(days)
        .ok()
        .filter(|_| days <= MAX_SUBSCRIPTION_DAYS)
        .and_then(|days| start.checked_add_days(Days::new(days)))
        .ok_or_else(|| AppError::invalid(field, "Quantidade de dias fora do intervalo permitido."))
}

/// Sobrescreve o período inteiro: começa hoje, dura `plan.duration_days`.
pub fn activate(shop: &mut ButcherShop, plan: &Plan, today: NaiveDate) -> Result<(), AppError> {
    let end = add_days(today, plan.duration_days, "durationDays")?;
    shop.subscription_plan_id = Some(plan.id);
    shop.subscription_start = Some(today);
    shop.subscription_end = Some(end);
    shop.subscription_status = SubscriptionStatus::Active;
    Ok(())
}

/// Soma ao fim atual se ele não passou (vencer hoje conta como vigente);
/// senão conta a partir de hoje.
pub fn extend(shop: &mut ButcherShop, days: i32, today: NaiveDate) -> Result<(), AppError> {
    let base = match shop.subscription_end {
        Some(end) if end >= today => end,
        _ => today,
    };
    shop.subscription_end = Some(add_days(base, days, "days")?);
    if shop.subscription_start.is_none() {
        shop.subscription_start = Some(today);
    }
    shop.subscription_status = SubscriptionStatus::Active;
    Ok(())
}

// Datas ficam intactas: uma extensão futura retoma do fim antigo
pub fn suspend(shop: &mut ButcherShop) -> Result<(), AppError> {
    shop.subscription_status = SubscriptionStatus::Suspended;
    Ok(())
}

pub fn change_plan(shop: &mut ButcherShop, plan: &Plan) -> Result<(), AppError> {
    shop.subscription_plan_id = Some(plan.id);
    Ok(())
}

// ---
// Serviço (administração da plataforma)
// ---

#[derive(Clone)]
pub struct SubscriptionService {
    shop_repo: ShopRepository,
    user_repo: UserRepository,
}

impl SubscriptionService {
    pub fn new(shop_repo: ShopRepository, user_repo: UserRepository) -> Self {
        Self { shop_repo, user_repo }
    }

    pub async fn get_shop(&self, butcher_id: Uuid) -> Result<ButcherShop, AppError> {
        self.shop_repo
            .find_by_id(self.shop_repo.pool(), butcher_id)
            .await?
            .ok_or(AppError::NotFound("Loja"))
    }

    pub async fn check_subscription(&self, butcher_id: Uuid) -> Result<SubscriptionCheck, AppError> {
        let shop = self.get_shop(butcher_id).await?;
        Ok(check(&shop, today()))
    }

    async fn require_plan(&self, plan_id: Option<Uuid>) -> Result<Plan, AppError> {
        let plan_id = plan_id.ok_or(AppError::PlanRequired)?;
        self.shop_repo
            .find_plan(self.shop_repo.pool(), plan_id)
            .await?
            .ok_or(AppError::NotFound("Plano"))
    }

    /// Lê a loja travada, aplica a transição e grava, tudo na mesma transação.
    async fn transition<F>(&self, butcher_id: Uuid, apply: F) -> Result<ButcherShop, AppError>
    where
        F: FnOnce(&mut ButcherShop) -> Result<(), AppError>,
    {
        let mut tx = self.shop_repo.pool().begin().await?;

        let mut shop = self
            .shop_repo
            .find_for_update(&mut *tx, butcher_id)
            .await?
            .ok_or(AppError::NotFound("Loja"))?;
        apply(&mut shop)?;
        let saved = self.shop_repo.save_subscription(&mut *tx, &shop).await?;

        tx.commit().await?;
        Ok(saved)
    }

    pub async fn activate(&self, butcher_id: Uuid, plan_id: Option<Uuid>) -> Result<ButcherShop, AppError> {
        let plan = self.require_plan(plan_id).await?;
        let shop = self
            .transition(butcher_id, |shop| activate(shop, &plan, today()))
            .await?;
        tracing::info!(butcher_id = %butcher_id, plan = %plan.name, end = ?shop.subscription_end, "Assinatura ativada");
        Ok(shop)
    }

    pub async fn extend(&self, butcher_id: Uuid, days: i32) -> Result<ButcherShop, AppError> {
        let shop = self
            .transition(butcher_id, |shop| extend(shop, days, today()))
            .await?;
        tracing::info!(butcher_id = %butcher_id, days, end = ?shop.subscription_end, "Assinatura estendida");
        Ok(shop)
    }

    pub async fn suspend(&self, butcher_id: Uuid) -> Result<ButcherShop, AppError> {
        let shop = self.transition(butcher_id, suspend).await?;
        tracing::warn!(butcher_id = %butcher_id, "Loja suspensa");
        Ok(shop)
    }

    pub async fn change_plan(&self, butcher_id: Uuid, plan_id: Option<Uuid>) -> Result<ButcherShop, AppError> {
        let plan = self.require_plan(plan_id).await?;
        self.transition(butcher_id, |shop| change_plan(shop, &plan)).await
    }

    // --- Lojas ---

    /// Dono + loja numa transação; com plano, já sai ativada.
    pub async fn create_shop(&self, payload: &CreateShopPayload) -> Result<ShopDetail, AppError> {
        let plan = match payload.plan_id {
            Some(id) => Some(self.require_plan(Some(id)).await?),
            None => None,
        };
        let hashed_password = hash_password(&payload.owner_password).await?;

        // 1. Inicia a transação
        let mut tx = self.shop_repo.pool().begin().await?;

        // 2. Dono (ainda sem loja)
        let owner = self
            .user_repo
            .create_user(
                &mut *tx,
                None,
                &payload.owner_name,
                &payload.owner_email,
                None,
                &hashed_password,
                Role::Owner,
            )
            .await?;

        // 3. Loja
        let mut shop = self
            .shop_repo
            .create(
                &mut *tx,
                &payload.shop_name,
                payload.shop_phone.as_deref(),
                payload.shop_address.as_deref(),
                owner.id,
                &random_token(API_KEY_LENGTH),
            )
            .await?;

        // 4. Liga o dono à loja
        self.user_repo.set_shop(&mut *tx, owner.id, shop.id).await?;

        // 5. Plano opcional
        if let Some(plan) = &plan {
            activate(&mut shop, plan, today())?;
            shop = self.shop_repo.save_subscription(&mut *tx, &shop).await?;
        }

        tx.commit().await?;

        tracing::info!(butcher_id = %shop.id, owner_id = %owner.id, "Loja criada");
        self.shop_detail(shop.id).await
    }

    pub async fn list_shops(&self, filter: &ShopFilter) -> Result<Vec<ButcherShop>, AppError> {
        self.shop_repo.list(filter).await
    }

    pub async fn shop_detail(&self, butcher_id: Uuid) -> Result<ShopDetail, AppError> {
        let shop = self.get_shop(butcher_id).await?;
        let plan = match shop.subscription_plan_id {
            Some(plan_id) => self.shop_repo.find_plan(self.shop_repo.pool(), plan_id).await?,
            None => None,
        };
        let stats = self.shop_repo.stats(butcher_id).await?;
        Ok(ShopDetail { butcher_shop: shop, plan, stats })
    }

    pub async fn update_shop(&self, butcher_id: Uuid, payload: &UpdateShopPayload) -> Result<ButcherShop, AppError> {
        self.shop_repo
            .update_contact(
                butcher_id,
                payload.name.as_deref(),
                payload.phone.as_deref(),
                payload.address.as_deref(),
            )
            .await?
            .ok_or(AppError::NotFound("Loja"))
    }

    pub async fn delete_shop(&self, butcher_id: Uuid) -> Result<(), AppError> {
        if !self.shop_repo.delete(butcher_id).await? {
            return Err(AppError::NotFound("Loja"));
        }
        tracing::warn!(butcher_id = %butcher_id, "Loja removida");
        Ok(())
    }

    pub async fn reset_api_key(&self, butcher_id: Uuid) -> Result<String, AppError> {
        let api_key = random_token(API_KEY_LENGTH);
        if !self.shop_repo.set_api_key(butcher_id, &api_key).await? {
            return Err(AppError::NotFound("Loja"));
        }
        Ok(api_key)
    }

    pub async fn shop_sales(
        &self,
        butcher_id: Uuid,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> Result<Vec<Sale>, AppError> {
        self.get_shop(butcher_id).await?;
        self.shop_repo.list_sales(butcher_id, date_from, date_to).await
    }

    // --- Planos ---

    pub async fn list_plans(&self) -> Result<Vec<PlanWithUsage>, AppError> {
        self.shop_repo.list_plans().await
    }

    pub async fn get_plan(&self, plan_id: Uuid) -> Result<Plan, AppError> {
        self.require_plan(Some(plan_id)).await
    }

    pub async fn create_plan(&self, payload: &PlanPayload) -> Result<Plan, AppError> {
        self.shop_repo
            .create_plan(&payload.name, payload.price, payload.duration_days)
            .await
    }

    /// Bloqueado depois que algum pagamento referencia o plano.
    pub async fn update_plan(&self, plan_id: Uuid, payload: &UpdatePlanPayload) -> Result<Plan, AppError> {
        let mut tx = self.shop_repo.pool().begin().await?;

        if self.shop_repo.plan_has_payments(&mut *tx, plan_id).await? {
            return Err(AppError::PlanInUse);
        }
        let plan = self
            .shop_repo
            .update_plan(
                &mut *tx,
                plan_id,
                payload.name.as_deref(),
                payload.price,
                payload.duration_days,
            )
            .await?
            .ok_or(AppError::NotFound("Plano"))?;

        tx.commit().await?;
        Ok(plan)
    }

    pub async fn delete_plan(&self, plan_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.shop_repo.pool().begin().await?;

        if self.shop_repo.plan_has_shops(&mut *tx, plan_id).await?
            || self.shop_repo.plan_has_payments(&mut *tx, plan_id).await?
        {
            return Err(AppError::PlanInUse);
        }
        if !self.shop_repo.delete_plan(&mut *tx, plan_id).await? {
            return Err(AppError::NotFound("Plano"));
        }

        tx.commit().await?;
        Ok(())
    }

    // --- Pagamentos da plataforma ---

    /// Registra o pagamento e (por padrão) ativa o plano, na mesma transação.
    pub async fn record_payment(
        &self,
        butcher_id: Uuid,
        payload: &RecordPaymentPayload,
    ) -> Result<PlatformPayment, AppError> {
        let plan = self.require_plan(Some(payload.plan_id)).await?;

        let mut tx = self.shop_repo.pool().begin().await?;

        let mut shop = self
            .shop_repo
            .find_for_update(&mut *tx, butcher_id)
            .await?
            .ok_or(AppError::NotFound("Loja"))?;

        let payment = self
            .shop_repo
            .insert_payment(
                &mut *tx,
                butcher_id,
                plan.id,
                payload.amount,
                payload.payment_date,
                payload.payment_method.as_deref(),
                payload.reference_number.as_deref(),
            )
            .await?;

        if payload.activate_subscription {
            activate(&mut shop, &plan, today())?;
            self.shop_repo.save_subscription(&mut *tx, &shop).await?;
        }

        tx.commit().await?;

        tracing::info!(
            butcher_id = %butcher_id,
            amount = %payment.amount,
            activated = payload.activate_subscription,
            "Pagamento da plataforma registrado"
        );
        Ok(payment)
    }

    pub async fn list_payments(&self) -> Result<Vec<PlatformPayment>, AppError> {
        self.shop_repo.list_payments().await
    }

    pub async fn dashboard(&self) -> Result<AdminDashboard, AppError> {
        self.shop_repo.dashboard().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn shop(status: SubscriptionStatus, end: Option<NaiveDate>) -> ButcherShop {
        ButcherShop {
            id: Uuid::new_v4(),
            name: "Talho Central".into(),
            phone: None,
            address: None,
            owner_id: None,
            api_key: None,
            subscription_plan_id: None,
            subscription_start: None,
            subscription_end: end,
            subscription_status: status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn plan(days: i32) -> Plan {
        Plan {
            id: Uuid::new_v4(),
            name: "Mensal".into(),
            price: Decimal::new(2500, 2),
            duration_days: days,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn predicate_follows_status_and_end_date() {
        let today = day(2025, 3, 10);

        assert!(is_active(&shop(SubscriptionStatus::Active, None), today));
        assert!(is_active(&shop(SubscriptionStatus::Active, Some(today)), today));

        let lapsed = check(&shop(SubscriptionStatus::Active, Some(day(2025, 3, 9))), today);
        assert!(!lapsed.active);
        assert_eq!(lapsed.reason, Some(SubscriptionDenial::Expired));

        let suspended = check(&shop(SubscriptionStatus::Suspended, None), today);
        assert_eq!(suspended.reason, Some(SubscriptionDenial::Suspended));
        assert!(!is_active(&shop(SubscriptionStatus::Expired, None), today));
    }

    #[test]
    fn extend_is_additive_but_activate_resets() {
        let today = day(2025, 3, 10);
        let ten_days_out = day(2025, 3, 20);

        let mut extended = shop(SubscriptionStatus::Active, Some(ten_days_out));
        extend(&mut extended, 5, today).unwrap();
        assert_eq!(extended.subscription_end, Some(day(2025, 3, 25)));

        let mut activated = shop(SubscriptionStatus::Active, Some(ten_days_out));
        let monthly = plan(30);
        activate(&mut activated, &monthly, today).unwrap();
        assert_eq!(activated.subscription_end, Some(day(2025, 4, 9)));
        assert_eq!(activated.subscription_start, Some(today));
        assert_eq!(activated.subscription_plan_id, Some(monthly.id));
    }

    #[test]
    fn extend_after_lapse_counts_from_today_and_reactivates() {
        let today = day(2025, 3, 10);
        let mut lapsed = shop(SubscriptionStatus::Expired, Some(day(2025, 1, 1)));

        extend(&mut lapsed, 7, today).unwrap();

        assert_eq!(lapsed.subscription_end, Some(day(2025, 3, 17)));
        assert_eq!(lapsed.subscription_status, SubscriptionStatus::Active);
    }

    #[test]
    fn suspend_keeps_dates_and_change_plan_keeps_status() {
        let today = day(2025, 3, 10);
        let end = Some(day(2025, 4, 1));

        let mut suspended = shop(SubscriptionStatus::Active, end);
        suspend(&mut suspended).unwrap();
        assert_eq!(suspended.subscription_status, SubscriptionStatus::Suspended);
        assert_eq!(suspended.subscription_end, end);

        // Retomar pela extensão parte do fim antigo
        extend(&mut suspended, 10, today).unwrap();
        assert_eq!(suspended.subscription_end, Some(day(2025, 4, 11)));

        let mut moved = shop(SubscriptionStatus::Expired, end);
        let annual = plan(365);
        change_plan(&mut moved, &annual).unwrap();
        assert_eq!(moved.subscription_plan_id, Some(annual.id));
        assert_eq!(moved.subscription_status, SubscriptionStatus::Expired);
        assert_eq!(moved.subscription_end, end);
    }

    #[test]
    fn extend_counts_an_end_of_today_as_current() {
        let today = day(2025, 3, 10);
        let mut due_today = shop(SubscriptionStatus::Active, Some(today));

        extend(&mut due_today, 1, today).unwrap();

        assert_eq!(due_today.subscription_end, Some(day(2025, 3, 11)));
    }

    #[test]
    fn day_counts_past_the_calendar_are_rejected_without_touching_the_shop() {
        let today = day(2025, 3, 10);
        let end = Some(day(2025, 4, 1));

        let mut extended = shop(SubscriptionStatus::Suspended, end);
        let result = extend(&mut extended, i32::MAX, today);
        assert!(matches!(result, Err(AppError::InvalidInput { .. })));
        assert_eq!(extended.subscription_end, end);
        assert_eq!(extended.subscription_status, SubscriptionStatus::Suspended);

        let mut activated = shop(SubscriptionStatus::Expired, end);
        let result = activate(&mut activated, &plan(i32::MAX), today);
        assert!(matches!(result, Err(AppError::InvalidInput { .. })));
        assert_eq!(activated.subscription_plan_id, None);

        let mut longest = shop(SubscriptionStatus::Active, None);
        extend(&mut longest, MAX_SUBSCRIPTION_DAYS, today).unwrap();
        assert!(longest.subscription_end.is_some());
    }

    #[test]
    fn day_payloads_are_capped_at_a_century() {
        use crate::models::shop::ExtendSubscriptionPayload;
        use validator::Validate;

        assert!(ExtendSubscriptionPayload { days: MAX_SUBSCRIPTION_DAYS }.validate().is_ok());
        assert!(ExtendSubscriptionPayload { days: MAX_SUBSCRIPTION_DAYS + 1 }.validate().is_err());
        assert!(ExtendSubscriptionPayload { days: i32::MAX }.validate().is_err());

        let plan = PlanPayload { name: "Eterno".into(), price: Decimal::ZERO, duration_days: i32::MAX };
        assert!(plan.validate().is_err());
    }
}
