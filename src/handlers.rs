pub mod admin;
pub mod auth;
pub mod catalog;
pub mod license;
pub mod sales;
pub mod shop;
pub mod stock;
