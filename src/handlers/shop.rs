// src/handlers/shop.rs
//
// Autoatendimento do dono da loja.

use axum::{extract::State, Json};
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::gate::{ops, Gated},
    models::shop::{ShopDetail, SubscriptionCheck, UpdateShopPayload},
};

pub async fn get_shop(
    State(app_state): State<AppState>,
    gate: Gated<ops::ManageShop>,
) -> Result<Json<ShopDetail>, AppError> {
    let detail = app_state.subscription_service.shop_detail(gate.butcher_id()).await?;
    Ok(Json(detail))
}

pub async fn update_shop(
    State(app_state): State<AppState>,
    gate: Gated<ops::ManageShop>,
    Json(payload): Json<UpdateShopPayload>,
) -> Result<Json<ShopDetail>, AppError> {
    payload.validate()?;
    app_state
        .subscription_service
        .update_shop(gate.butcher_id(), &payload)
        .await?;
    let detail = app_state.subscription_service.shop_detail(gate.butcher_id()).await?;
    Ok(Json(detail))
}

pub async fn generate_api_key(
    State(app_state): State<AppState>,
    gate: Gated<ops::ManageShop>,
) -> Result<Json<Value>, AppError> {
    let api_key = app_state.subscription_service.reset_api_key(gate.butcher_id()).await?;
    Ok(Json(json!({ "apiKey": api_key })))
}

// GET /api/shop/subscription
#[utoipa::path(
    get,
    path = "/api/shop/subscription",
    tag = "Shop",
    responses((status = 200, description = "Situação da assinatura", body = SubscriptionCheck)),
    security(("api_jwt" = []))
)]
pub async fn subscription_status(
    State(app_state): State<AppState>,
    gate: Gated<ops::ViewSubscription>,
) -> Result<Json<SubscriptionCheck>, AppError> {
    let check = app_state
        .subscription_service
        .check_subscription(gate.butcher_id())
        .await?;
    Ok(Json(check))
}
