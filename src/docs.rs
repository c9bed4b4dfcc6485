// src/docs.rs

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::get_me,

        // --- Sales ---
        handlers::sales::submit_sale,
        handlers::sales::sync_sales,
        handlers::sales::list_sales,
        handlers::sales::get_sale,
        handlers::sales::sales_report,

        // --- Stock ---
        handlers::stock::open_session,
        handlers::stock::close_session,
        handlers::stock::list_sessions,

        // --- License ---
        handlers::license::license_status,
        handlers::license::redeem_unlock_code,

        // --- Shop ---
        handlers::shop::subscription_status,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Role,
            models::auth::User,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Sales ---
            models::sales::Sale,
            models::sales::SaleItem,
            models::sales::SaleDetail,
            models::sales::SubmitSalePayload,
            models::sales::SaleItemPayload,
            models::sales::SyncSalesPayload,
            models::sales::SyncSaleEntry,
            models::sales::SyncItemEntry,
            models::sales::SyncOutcome,
            models::sales::PaymentMethodTotal,
            models::sales::SalesSummary,
            models::sales::SaleListing,
            models::sales::DailySalesEntry,
            models::sales::SalesReport,

            // --- Stock ---
            models::stock::StockSessionStatus,
            models::stock::StockSession,
            models::stock::StockMovement,
            models::stock::StockSessionDetail,
            models::stock::OpenSessionPayload,
            models::stock::OpeningMovementPayload,
            models::stock::CloseSessionPayload,
            models::stock::ClosingMovementPayload,
            models::stock::OpenOutcome,
            models::stock::ProductVariance,
            models::stock::CloseOutcome,

            // --- License ---
            models::license::LicenseStatus,
            models::license::LicenseView,
            models::license::RedeemCodePayload,
            models::license::UnlockOutcome,

            // --- Shop ---
            models::shop::SubscriptionStatus,
            models::shop::SubscriptionDenial,
            models::shop::SubscriptionCheck,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação"),
        (name = "Sales", description = "Sincronização e consulta de vendas"),
        (name = "Stock", description = "Sessões de contagem de estoque"),
        (name = "License", description = "Licença de uso e códigos de desbloqueio"),
        (name = "Shop", description = "Assinatura da loja")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme("api_jwt", SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)));
    }
}
