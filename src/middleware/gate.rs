// src/middleware/gate.rs
//
// Portão de acesso das operações de loja: conta ativa -> papel permitido ->
// assinatura ativa (Super Admin passa direto) -> licença destravada (só nas
// operações medidas). A primeira falha vence.

use std::marker::PhantomData;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use uuid::Uuid;

use crate::{
    common::{db_utils::today, error::AppError},
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::{Role, User},
        license::License,
        shop::{ButcherShop, SubscriptionCheck, SubscriptionDenial},
    },
    services::subscription_service,
};

// Cabeçalho com o qual o Super Admin escolhe a loja
const TENANT_ID_HEADER: &str = "x-tenant-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ViewProducts,
    ManageProducts,
    SubmitSale,
    SyncSales,
    ViewSales,
    ViewReports,
    OpenStockSession,
    CloseStockSession,
    ViewStockSessions,
    RegisterDevice,
    ViewLicense,
    RedeemUnlockCode,
    ManageShop,
    ViewSubscription,
    ManageStaff,
}

const ALL_SHOP_ROLES: &[Role] = &[Role::SuperAdmin, Role::Owner, Role::Manager, Role::Cashier];
const MANAGEMENT: &[Role] = &[Role::SuperAdmin, Role::Owner, Role::Manager];
const OWNER_ONLY: &[Role] = &[Role::SuperAdmin, Role::Owner];

pub fn permitted_roles(op: Operation) -> &'static [Role] {
    use Operation::*;
    match op {
        ViewProducts | SubmitSale | SyncSales | ViewSales | OpenStockSession
        | CloseStockSession | ViewStockSessions | RegisterDevice | ViewLicense
        | RedeemUnlockCode => ALL_SHOP_ROLES,
        ManageProducts | ViewReports => MANAGEMENT,
        ManageShop | ViewSubscription | ManageStaff => OWNER_ONLY,
    }
}

/// Operações que consomem a licença.
pub fn is_metered(op: Operation) -> bool {
    matches!(op, Operation::SubmitSale | Operation::SyncSales | Operation::CloseStockSession)
}

/// Checagens que não dependem da loja.
pub fn admit_caller(op: Operation, user: &User) -> Result<(), AppError> {
    if !user.is_active {
        return Err(AppError::AccountInactive);
    }
    if !permitted_roles(op).contains(&user.role) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Checagens da loja. `license` precisa vir preenchida nas operações medidas.
pub fn admit_tenant(
    op: Operation,
    user: &User,
    subscription: &SubscriptionCheck,
    license: Option<&License>,
) -> Result<(), AppError> {
    if !user.is_super_admin() {
        match subscription.reason {
            Some(SubscriptionDenial::Suspended) => return Err(AppError::SubscriptionSuspended),
            Some(SubscriptionDenial::Expired) => return Err(AppError::SubscriptionExpired),
            None => {}
        }
    }
    if is_metered(op) && license.is_some_and(License::is_locked) {
        return Err(AppError::LicenseLocked);
    }
    Ok(())
}

/// Loja alvo: a do próprio usuário, ou a do cabeçalho para o Super Admin.
fn resolve_tenant(parts: &Parts, user: &User) -> Result<Uuid, AppError> {
    if let Some(butcher_id) = user.butcher_id {
        return Ok(butcher_id);
    }
    if !user.is_super_admin() {
        return Err(AppError::NoShop);
    }

    let raw = parts
        .headers
        .get(TENANT_ID_HEADER)
        .ok_or(AppError::NoShop)?
        .to_str()
        .map_err(|_| AppError::invalid(TENANT_ID_HEADER, "Cabeçalho contém caracteres inválidos."))?;
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::invalid(TENANT_ID_HEADER, "Cabeçalho inválido (não é um UUID)."))
}

// ---
// O Extractor (Guardião)
// ---

/// 1. O Trait que liga um tipo marcador à sua operação
pub trait OperationDef: Send + Sync + 'static {
    const OP: Operation;
}

/// 2. Admissão concedida: carrega o usuário e a loja já validados
pub struct Gated<O> {
    pub user: User,
    pub shop: ButcherShop,
    _op: PhantomData<O>,
}

impl<O> Gated<O> {
    pub fn butcher_id(&self) -> Uuid {
        self.shop.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

impl<O, S> FromRequestParts<S> for Gated<O>
where
    O: OperationDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;

        // A. Conta e papel (sem tocar no banco)
        admit_caller(O::OP, &user)?;

        // B. Loja e assinatura
        let butcher_id = resolve_tenant(parts, &user)?;
        let shop = app_state.subscription_service.get_shop(butcher_id).await?;
        let subscription = subscription_service::check(&shop, today());

        // C. Licença, relida a cada requisição
        let license = if is_metered(O::OP) {
            Some(app_state.license_service.get_or_create(butcher_id).await?)
        } else {
            None
        };

        if let Err(denied) = admit_tenant(O::OP, &user, &subscription, license.as_ref()) {
            tracing::warn!(user_id = %user.id, butcher_id = %butcher_id, op = ?O::OP, reason = %denied, "Acesso negado");
            return Err(denied);
        }

        Ok(Gated { user, shop, _op: PhantomData })
    }
}

// ---
// DEFINIÇÃO DAS OPERAÇÕES (TIPOS)
// ---

macro_rules! operations {
    ($($marker:ident),* $(,)?) => {
        pub mod ops {
            $(
                pub struct $marker;
                impl super::OperationDef for $marker {
                    const OP: super::Operation = super::Operation::$marker;
                }
            )*
        }
    };
}

operations!(
    ViewProducts,
    ManageProducts,
    SubmitSale,
    SyncSales,
    ViewSales,
    ViewReports,
    OpenStockSession,
    CloseStockSession,
    ViewStockSessions,
    RegisterDevice,
    ViewLicense,
    RedeemUnlockCode,
    ManageShop,
    ViewSubscription,
    ManageStaff,
);

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{license::LicenseStatus, shop::SubscriptionStatus};

    fn user(role: Role, active: bool) -> User {
        User {
            id: Uuid::new_v4(),
            butcher_id: (role != Role::SuperAdmin).then(Uuid::new_v4),
            name: "Operador".into(),
            email: "op@talho.test".into(),
            username: None,
            password_hash: String::new(),
            role,
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn subscription(reason: Option<SubscriptionDenial>) -> SubscriptionCheck {
        SubscriptionCheck {
            active: reason.is_none(),
            reason,
            status: match reason {
                None => SubscriptionStatus::Active,
                Some(SubscriptionDenial::Suspended) => SubscriptionStatus::Suspended,
                Some(SubscriptionDenial::Expired) => SubscriptionStatus::Expired,
            },
            plan_id: None,
            subscription_start: None,
            subscription_end: None,
        }
    }

    fn evaluate(
        op: Operation,
        user: &User,
        subscription: &SubscriptionCheck,
        license: Option<&License>,
    ) -> Result<(), AppError> {
        admit_caller(op, user)?;
        admit_tenant(op, user, subscription, license)
    }

    fn license(count: i64, limit: i64) -> License {
        License {
            id: Uuid::new_v4(),
            butcher_id: Uuid::new_v4(),
            plan: "free".into(),
            status: LicenseStatus::Active,
            payment_count: count,
            payment_limit: limit,
            expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn first_failure_wins() {
        let expired = subscription(Some(SubscriptionDenial::Expired));
        let locked = license(100, 100);

        let inactive = user(Role::Cashier, false);
        assert!(matches!(
            evaluate(Operation::SubmitSale, &inactive, &expired, Some(&locked)),
            Err(AppError::AccountInactive)
        ));

        let cashier = user(Role::Cashier, true);
        assert!(matches!(
            evaluate(Operation::ViewReports, &cashier, &expired, None),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            evaluate(Operation::SubmitSale, &cashier, &expired, Some(&locked)),
            Err(AppError::SubscriptionExpired)
        ));

        let suspended = subscription(Some(SubscriptionDenial::Suspended));
        assert!(matches!(
            evaluate(Operation::SyncSales, &cashier, &suspended, Some(&locked)),
            Err(AppError::SubscriptionSuspended)
        ));

        let active = subscription(None);
        assert!(matches!(
            evaluate(Operation::CloseStockSession, &cashier, &active, Some(&locked)),
            Err(AppError::LicenseLocked)
        ));
        assert!(evaluate(Operation::SubmitSale, &cashier, &active, Some(&license(99, 100))).is_ok());
    }

    #[test]
    fn locked_license_only_blocks_metered_operations() {
        let manager = user(Role::Manager, true);
        let active = subscription(None);
        let locked = license(100, 100);

        assert!(evaluate(Operation::OpenStockSession, &manager, &active, Some(&locked)).is_ok());
        assert!(evaluate(Operation::ViewSales, &manager, &active, Some(&locked)).is_ok());
        assert!(evaluate(Operation::RedeemUnlockCode, &manager, &active, Some(&locked)).is_ok());
        assert!(matches!(
            evaluate(Operation::SyncSales, &manager, &active, Some(&locked)),
            Err(AppError::LicenseLocked)
        ));
    }

    #[test]
    fn super_admin_bypasses_subscription_but_not_license() {
        let admin = user(Role::SuperAdmin, true);
        let suspended = subscription(Some(SubscriptionDenial::Suspended));

        assert!(evaluate(Operation::ManageShop, &admin, &suspended, None).is_ok());
        assert!(matches!(
            evaluate(Operation::SubmitSale, &admin, &suspended, Some(&license(5, 5))),
            Err(AppError::LicenseLocked)
        ));
    }

    #[test]
    fn role_table_matches_shop_hierarchy() {
        assert!(permitted_roles(Operation::SubmitSale).contains(&Role::Cashier));
        assert!(!permitted_roles(Operation::ManageProducts).contains(&Role::Cashier));
        assert!(permitted_roles(Operation::ManageProducts).contains(&Role::Manager));
        assert!(!permitted_roles(Operation::ManageStaff).contains(&Role::Manager));
        assert!(is_metered(Operation::CloseStockSession));
        assert!(!is_metered(Operation::OpenStockSession));
    }

    #[test]
    fn tenant_comes_from_user_or_header_for_super_admin() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();

        let owner = user(Role::Owner, true);
        assert_eq!(resolve_tenant(&parts, &owner).unwrap(), owner.butcher_id.unwrap());

        let admin = user(Role::SuperAdmin, true);
        assert!(matches!(resolve_tenant(&parts, &admin), Err(AppError::NoShop)));

        let target = Uuid::new_v4();
        parts.headers.insert(TENANT_ID_HEADER, target.to_string().parse().unwrap());
        assert_eq!(resolve_tenant(&parts, &admin).unwrap(), target);

        let mut orphan = user(Role::Cashier, true);
        orphan.butcher_id = None;
        assert!(matches!(resolve_tenant(&parts, &orphan), Err(AppError::NoShop)));
    }
}
