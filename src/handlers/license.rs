// src/handlers/license.rs

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::gate::{ops, Gated},
    models::license::{LicenseView, RedeemCodePayload, UnlockOutcome},
};

// GET /api/license/status
#[utoipa::path(
    get,
    path = "/api/license/status",
    tag = "License",
    responses((status = 200, description = "Situação da licença", body = LicenseView)),
    security(("api_jwt" = []))
)]
pub async fn license_status(
    State(app_state): State<AppState>,
    gate: Gated<ops::ViewLicense>,
) -> Result<Json<LicenseView>, AppError> {
    let license = app_state.license_service.get_or_create(gate.butcher_id()).await?;
    Ok(Json(license.view()))
}

// POST /api/license/unlock
#[utoipa::path(
    post,
    path = "/api/license/unlock",
    tag = "License",
    request_body = RedeemCodePayload,
    responses(
        (status = 200, description = "Licença desbloqueada", body = UnlockOutcome),
        (status = 400, description = "Código inválido, usado ou expirado")
    ),
    security(("api_jwt" = []))
)]
pub async fn redeem_unlock_code(
    State(app_state): State<AppState>,
    gate: Gated<ops::RedeemUnlockCode>,
    Json(payload): Json<RedeemCodePayload>,
) -> Result<Json<UnlockOutcome>, AppError> {
    payload.validate()?;

    let outcome = app_state
        .license_service
        .redeem(gate.butcher_id(), &payload.unlock_code, gate.shop.phone.as_deref())
        .await?;
    Ok(Json(outcome))
}
