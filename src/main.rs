//src/main.rs

use anyhow::Context;
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Config};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;
    let app_state = AppState::new(&config).await?;

    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados")?;

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    if let Some((email, password)) = &config.super_admin {
        app_state
            .auth_service
            .ensure_super_admin(email, password)
            .await
            .context("Falha ao criar o super admin")?;
    }

    // Rotas da loja (o gate de cada handler cuida de papel, assinatura e licença)
    let shop_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route(
            "/shop",
            get(handlers::shop::get_shop).put(handlers::shop::update_shop),
        )
        .route("/shop/generate-api-key", post(handlers::shop::generate_api_key))
        .route("/shop/subscription", get(handlers::shop::subscription_status))
        .route(
            "/users",
            get(handlers::catalog::list_staff).post(handlers::catalog::create_staff),
        )
        .route("/users/{id}/toggle", patch(handlers::catalog::toggle_staff))
        .route(
            "/products",
            get(handlers::catalog::list_products).post(handlers::catalog::create_product),
        )
        .route(
            "/products/{id}",
            put(handlers::catalog::update_product).delete(handlers::catalog::delete_product),
        )
        .route(
            "/sales",
            get(handlers::sales::list_sales).post(handlers::sales::submit_sale),
        )
        .route("/sales/sync", post(handlers::sales::sync_sales))
        .route("/sales/{id}", get(handlers::sales::get_sale))
        .route("/reports/sales", get(handlers::sales::sales_report))
        .route("/stock-sessions", get(handlers::stock::list_sessions))
        .route("/stock-sessions/open", post(handlers::stock::open_session))
        .route("/stock-sessions/close", post(handlers::stock::close_session))
        .route("/devices/register", post(handlers::catalog::register_device))
        .route("/license/status", get(handlers::license::license_status))
        .route("/license/unlock", post(handlers::license::redeem_unlock_code))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Super admin
    let admin_routes = Router::new()
        .route("/dashboard", get(handlers::admin::dashboard))
        .route("/payments", get(handlers::admin::list_payments))
        .route(
            "/plans",
            get(handlers::admin::list_plans).post(handlers::admin::create_plan),
        )
        .route(
            "/plans/{id}",
            get(handlers::admin::get_plan)
                .put(handlers::admin::update_plan)
                .delete(handlers::admin::delete_plan),
        )
        .route(
            "/butcher-shops",
            get(handlers::admin::list_shops).post(handlers::admin::create_shop),
        )
        .route(
            "/butcher-shops/{id}",
            get(handlers::admin::get_shop)
                .put(handlers::admin::update_shop)
                .delete(handlers::admin::delete_shop),
        )
        .route("/butcher-shops/{id}/suspend", post(handlers::admin::suspend_shop))
        .route("/butcher-shops/{id}/activate", post(handlers::admin::activate_shop))
        .route("/butcher-shops/{id}/extend", post(handlers::admin::extend_subscription))
        .route("/butcher-shops/{id}/change-plan", post(handlers::admin::change_plan))
        .route("/butcher-shops/{id}/reset-api-key", post(handlers::admin::reset_api_key))
        .route("/butcher-shops/{id}/payments", post(handlers::admin::record_payment))
        .route("/butcher-shops/{id}/sales", get(handlers::admin::shop_sales))
        .route(
            "/unlock-codes",
            get(handlers::admin::list_codes).post(handlers::admin::generate_codes),
        )
        .route("/unlock-codes/{id}", delete(handlers::admin::delete_code))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/login", post(handlers::auth::login))
        .nest("/api", shop_routes)
        .nest("/api/admin", admin_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state);

    let listener = TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("Falha ao iniciar o listener TCP em {}", config.server_addr))?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("Erro no servidor Axum")?;
    Ok(())
}
