// src/handlers/catalog.rs
//
// Produtos, funcionários e dispositivos da loja.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::gate::{ops, Gated},
    models::{
        auth::{CreateStaffPayload, User},
        catalog::{Device, Product, ProductPayload, RegisterDevicePayload, UpdateProductPayload},
    },
};

// --- Produtos ---

pub async fn list_products(
    State(app_state): State<AppState>,
    gate: Gated<ops::ViewProducts>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = app_state.catalog_service.list_products(gate.butcher_id()).await?;
    Ok(Json(products))
}

pub async fn create_product(
    State(app_state): State<AppState>,
    gate: Gated<ops::ManageProducts>,
    Json(payload): Json<ProductPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let product = app_state
        .catalog_service
        .create_product(gate.butcher_id(), &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(app_state): State<AppState>,
    gate: Gated<ops::ManageProducts>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateProductPayload>,
) -> Result<Json<Product>, AppError> {
    payload.validate()?;
    let product = app_state
        .catalog_service
        .update_product(gate.butcher_id(), product_id, &payload)
        .await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(app_state): State<AppState>,
    gate: Gated<ops::ManageProducts>,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state
        .catalog_service
        .delete_product(gate.butcher_id(), product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Funcionários ---

pub async fn list_staff(
    State(app_state): State<AppState>,
    gate: Gated<ops::ManageStaff>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = app_state.auth_service.list_staff(gate.butcher_id()).await?;
    Ok(Json(users))
}

pub async fn create_staff(
    State(app_state): State<AppState>,
    gate: Gated<ops::ManageStaff>,
    Json(payload): Json<CreateStaffPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user = app_state
        .auth_service
        .create_staff(gate.butcher_id(), &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn toggle_staff(
    State(app_state): State<AppState>,
    gate: Gated<ops::ManageStaff>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    let user = app_state
        .auth_service
        .toggle_staff(gate.butcher_id(), user_id)
        .await?;
    Ok(Json(user))
}

// --- Dispositivos ---

pub async fn register_device(
    State(app_state): State<AppState>,
    gate: Gated<ops::RegisterDevice>,
    Json(payload): Json<RegisterDevicePayload>,
) -> Result<Json<Device>, AppError> {
    payload.validate()?;
    let device = app_state
        .catalog_service
        .register_device(gate.butcher_id(), &payload)
        .await?;
    Ok(Json(device))
}
