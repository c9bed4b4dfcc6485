// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{LicenseRepository, ProductRepository, SalesRepository, ShopRepository, StockRepository, UserRepository},
    services::{
        AuthService, CatalogService, LicenseService, LogNotifier, StockService, SubscriptionService,
        SyncService,
    },
};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub db_max_connections: u32,
    pub jwt_ttl_days: i64,
    pub strict_unlock_codes: bool,
    pub super_admin: Option<(String, String)>,
}

fn var_or<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} tem um valor inválido: '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let super_admin = match (env::var("SUPER_ADMIN_EMAIL"), env::var("SUPER_ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some((email, password)),
            _ => None,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?,
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            db_max_connections: var_or("DB_MAX_CONNECTIONS", 5)?,
            jwt_ttl_days: var_or("JWT_TTL_DAYS", 7)?,
            strict_unlock_codes: var_or("STRICT_UNLOCK_CODES", false)?,
            super_admin,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub auth_service: AuthService,
    pub subscription_service: SubscriptionService,
    pub license_service: LicenseService,
    pub sync_service: SyncService,
    pub stock_service: StockService,
    pub catalog_service: CatalogService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let shop_repo = ShopRepository::new(db_pool.clone());

        let auth_service = AuthService::new(user_repo.clone(), config.jwt_secret.clone(), config.jwt_ttl_days);
        let subscription_service = SubscriptionService::new(shop_repo, user_repo);
        let license_service = LicenseService::new(
            Arc::new(LicenseRepository::new(db_pool.clone())),
            Arc::new(LogNotifier),
            config.strict_unlock_codes,
        );
        let sync_service = SyncService::new(Arc::new(SalesRepository::new(db_pool.clone())));
        let stock_service = StockService::new(Arc::new(StockRepository::new(db_pool.clone())));
        let catalog_service = CatalogService::new(ProductRepository::new(db_pool.clone()));

        Ok(Self {
            db_pool,
            auth_service,
            subscription_service,
            license_service,
            sync_service,
            stock_service,
            catalog_service,
        })
    }
}
