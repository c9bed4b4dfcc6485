// src/handlers/admin.rs
//
// Rotas da plataforma (Super Admin): planos, lojas, pagamentos e códigos.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::SuperAdmin,
    models::{
        dashboard::AdminDashboard,
        license::{CodeFilter, CodeListing, GenerateCodesPayload, UnlockCode},
        sales::Sale,
        shop::{
            ButcherShop, CreateShopPayload, ExtendSubscriptionPayload, Plan, PlanPayload,
            PlanSelectionPayload, PlanWithUsage, PlatformPayment, RecordPaymentPayload, ShopDetail,
            ShopFilter, UpdatePlanPayload, UpdateShopPayload,
        },
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

// ---
// Painel e pagamentos
// ---

pub async fn dashboard(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
) -> Result<Json<AdminDashboard>, AppError> {
    Ok(Json(app_state.subscription_service.dashboard().await?))
}

pub async fn list_payments(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
) -> Result<Json<Vec<PlatformPayment>>, AppError> {
    Ok(Json(app_state.subscription_service.list_payments().await?))
}

pub async fn record_payment(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Path(butcher_id): Path<Uuid>,
    Json(payload): Json<RecordPaymentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let payment = app_state
        .subscription_service
        .record_payment(butcher_id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

// ---
// Planos
// ---

pub async fn list_plans(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
) -> Result<Json<Vec<PlanWithUsage>>, AppError> {
    Ok(Json(app_state.subscription_service.list_plans().await?))
}

pub async fn create_plan(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Json(payload): Json<PlanPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let plan = app_state.subscription_service.create_plan(&payload).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn get_plan(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<Plan>, AppError> {
    Ok(Json(app_state.subscription_service.get_plan(plan_id).await?))
}

pub async fn update_plan(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Path(plan_id): Path<Uuid>,
    Json(payload): Json<UpdatePlanPayload>,
) -> Result<Json<Plan>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.subscription_service.update_plan(plan_id, &payload).await?))
}

pub async fn delete_plan(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Path(plan_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.subscription_service.delete_plan(plan_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---
// Lojas
// ---

pub async fn list_shops(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Query(filter): Query<ShopFilter>,
) -> Result<Json<Vec<ButcherShop>>, AppError> {
    Ok(Json(app_state.subscription_service.list_shops(&filter).await?))
}

pub async fn create_shop(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Json(payload): Json<CreateShopPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let detail = app_state.subscription_service.create_shop(&payload).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_shop(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Path(butcher_id): Path<Uuid>,
) -> Result<Json<ShopDetail>, AppError> {
    Ok(Json(app_state.subscription_service.shop_detail(butcher_id).await?))
}

pub async fn update_shop(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Path(butcher_id): Path<Uuid>,
    Json(payload): Json<UpdateShopPayload>,
) -> Result<Json<ButcherShop>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.subscription_service.update_shop(butcher_id, &payload).await?))
}

pub async fn delete_shop(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Path(butcher_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.subscription_service.delete_shop(butcher_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn suspend_shop(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Path(butcher_id): Path<Uuid>,
) -> Result<Json<ButcherShop>, AppError> {
    Ok(Json(app_state.subscription_service.suspend(butcher_id).await?))
}

pub async fn activate_shop(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Path(butcher_id): Path<Uuid>,
    Json(payload): Json<PlanSelectionPayload>,
) -> Result<Json<ButcherShop>, AppError> {
    Ok(Json(app_state.subscription_service.activate(butcher_id, payload.plan_id).await?))
}

pub async fn extend_subscription(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Path(butcher_id): Path<Uuid>,
    Json(payload): Json<ExtendSubscriptionPayload>,
) -> Result<Json<ButcherShop>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.subscription_service.extend(butcher_id, payload.days).await?))
}

pub async fn change_plan(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Path(butcher_id): Path<Uuid>,
    Json(payload): Json<PlanSelectionPayload>,
) -> Result<Json<ButcherShop>, AppError> {
    Ok(Json(app_state.subscription_service.change_plan(butcher_id, payload.plan_id).await?))
}

pub async fn reset_api_key(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Path(butcher_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let api_key = app_state.subscription_service.reset_api_key(butcher_id).await?;
    Ok(Json(json!({ "apiKey": api_key })))
}

pub async fn shop_sales(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Path(butcher_id): Path<Uuid>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<Sale>>, AppError> {
    let sales = app_state
        .subscription_service
        .shop_sales(butcher_id, range.date_from, range.date_to)
        .await?;
    Ok(Json(sales))
}

// ---
// Códigos de desbloqueio
// ---

pub async fn list_codes(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Query(filter): Query<CodeFilter>,
) -> Result<Json<CodeListing>, AppError> {
    Ok(Json(app_state.license_service.list_codes(&filter).await?))
}

pub async fn generate_codes(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Json(payload): Json<GenerateCodesPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    if payload.expires_at.is_some_and(|at| at <= chrono::Utc::now()) {
        return Err(AppError::invalid("expiresAt", "A validade precisa estar no futuro."));
    }

    // Código pré-atribuído: a loja precisa existir e recebe o aviso
    let phone = match payload.butcher_id {
        Some(butcher_id) => app_state.subscription_service.get_shop(butcher_id).await?.phone,
        None => None,
    };

    let codes: Vec<UnlockCode> = app_state
        .license_service
        .generate_codes(&payload, phone.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(codes)))
}

pub async fn delete_code(
    State(app_state): State<AppState>,
    _admin: SuperAdmin,
    Path(code_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.license_service.delete_code(code_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
