// src/handlers/sales.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::gate::{ops, Gated},
    models::sales::{
        ReportQuery, SaleDetail, SaleFilter, SaleListing, SalesReport, SubmitSalePayload,
        SyncOutcome, SyncSalesPayload,
    },
};

// POST /api/sales
#[utoipa::path(
    post,
    path = "/api/sales",
    tag = "Sales",
    request_body = SubmitSalePayload,
    responses(
        (status = 201, description = "Venda registrada", body = SaleDetail),
        (status = 200, description = "Venda já existia (reenvio)", body = SaleDetail),
        (status = 403, description = "Assinatura inativa ou licença travada"),
        (status = 404, description = "Produto ou operador de outra loja")
    ),
    security(("api_jwt" = []))
)]
pub async fn submit_sale(
    State(app_state): State<AppState>,
    gate: Gated<ops::SubmitSale>,
    Json(payload): Json<SubmitSalePayload>,
) -> Result<impl IntoResponse, AppError> {
    let (sale, created) = app_state
        .sync_service
        .submit_sale(gate.butcher_id(), gate.user_id(), payload)
        .await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(sale)))
}

// POST /api/sales/sync
#[utoipa::path(
    post,
    path = "/api/sales/sync",
    tag = "Sales",
    request_body = SyncSalesPayload,
    responses(
        (status = 200, description = "Lote processado", body = SyncOutcome),
        (status = 403, description = "Assinatura inativa ou licença travada")
    ),
    security(("api_jwt" = []))
)]
pub async fn sync_sales(
    State(app_state): State<AppState>,
    gate: Gated<ops::SyncSales>,
    Json(payload): Json<SyncSalesPayload>,
) -> Result<Json<SyncOutcome>, AppError> {
    let outcome = app_state
        .sync_service
        .submit_batch(gate.butcher_id(), payload)
        .await?;
    Ok(Json(outcome))
}

// GET /api/sales
#[utoipa::path(
    get,
    path = "/api/sales",
    tag = "Sales",
    responses((status = 200, description = "Vendas da loja com resumo", body = SaleListing)),
    security(("api_jwt" = []))
)]
pub async fn list_sales(
    State(app_state): State<AppState>,
    gate: Gated<ops::ViewSales>,
    Query(filter): Query<SaleFilter>,
) -> Result<Json<SaleListing>, AppError> {
    let listing = app_state.sync_service.list_sales(gate.butcher_id(), &filter).await?;
    Ok(Json(listing))
}

// GET /api/sales/{id}
#[utoipa::path(
    get,
    path = "/api/sales/{id}",
    tag = "Sales",
    params(("id" = Uuid, Path, description = "ID da venda")),
    responses(
        (status = 200, description = "Venda com itens", body = SaleDetail),
        (status = 404, description = "Venda não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_sale(
    State(app_state): State<AppState>,
    gate: Gated<ops::ViewSales>,
    Path(sale_id): Path<Uuid>,
) -> Result<Json<SaleDetail>, AppError> {
    let sale = app_state.sync_service.get_sale(gate.butcher_id(), sale_id).await?;
    Ok(Json(sale))
}

// GET /api/reports/sales
#[utoipa::path(
    get,
    path = "/api/reports/sales",
    tag = "Sales",
    params(
        ("date_from" = String, Query, description = "Data inicial (AAAA-MM-DD)"),
        ("date_to" = String, Query, description = "Data final (AAAA-MM-DD)")
    ),
    responses((status = 200, description = "Relatório do período", body = SalesReport)),
    security(("api_jwt" = []))
)]
pub async fn sales_report(
    State(app_state): State<AppState>,
    gate: Gated<ops::ViewReports>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<SalesReport>, AppError> {
    let report = app_state.sync_service.sales_report(gate.butcher_id(), &query).await?;
    Ok(Json(report))
}
