pub mod auth;
pub use auth::AuthService;
pub mod catalog_service;
pub use catalog_service::CatalogService;
pub mod license_service;
pub use license_service::LicenseService;
pub mod notification_service;
pub use notification_service::{LogNotifier, NotificationSink};
pub mod stock_service;
pub use stock_service::StockService;
pub mod subscription_service;
pub use subscription_service::SubscriptionService;
pub mod sync_service;
pub use sync_service::SyncService;
