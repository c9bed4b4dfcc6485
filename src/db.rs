pub mod store;
pub use store::{LicenseStore, SaleStore, StockStore, TenantScope};

pub mod user_repo;
pub use user_repo::UserRepository;
pub mod shop_repo;
pub use shop_repo::ShopRepository;
pub mod product_repo;
pub use product_repo::ProductRepository;
pub mod license_repo;
pub use license_repo::LicenseRepository;
pub mod sales_repo;
pub use sales_repo::SalesRepository;
pub mod stock_repo;
pub use stock_repo::StockRepository;

#[cfg(test)]
pub mod memory;
