// src/models/dashboard.rs

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

// Visão geral do Super Admin
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub total_shops: i64,
    pub active_shops: i64,
    pub expired_shops: i64,
    pub suspended_shops: i64,
    pub total_sales: i64,
    pub platform_revenue: Decimal,
}
