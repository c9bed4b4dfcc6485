// src/handlers/stock.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::gate::{ops, Gated},
    models::stock::{
        CloseOutcome, CloseSessionPayload, OpenOutcome, OpenSessionPayload, SessionFilter,
        StockSessionDetail,
    },
};

// POST /api/stock-sessions/open
#[utoipa::path(
    post,
    path = "/api/stock-sessions/open",
    tag = "Stock",
    request_body = OpenSessionPayload,
    responses((status = 201, description = "Sessão aberta", body = OpenOutcome)),
    security(("api_jwt" = []))
)]
pub async fn open_session(
    State(app_state): State<AppState>,
    gate: Gated<ops::OpenStockSession>,
    Json(payload): Json<OpenSessionPayload>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state
        .stock_service
        .open_session(gate.butcher_id(), gate.user_id(), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// POST /api/stock-sessions/close
#[utoipa::path(
    post,
    path = "/api/stock-sessions/close",
    tag = "Stock",
    request_body = CloseSessionPayload,
    responses(
        (status = 200, description = "Sessão fechada com a variação apurada", body = CloseOutcome),
        (status = 403, description = "Assinatura inativa ou licença travada")
    ),
    security(("api_jwt" = []))
)]
pub async fn close_session(
    State(app_state): State<AppState>,
    gate: Gated<ops::CloseStockSession>,
    Json(payload): Json<CloseSessionPayload>,
) -> Result<Json<CloseOutcome>, AppError> {
    let outcome = app_state
        .stock_service
        .close_session(gate.butcher_id(), gate.user_id(), payload)
        .await?;
    Ok(Json(outcome))
}

// GET /api/stock-sessions
#[utoipa::path(
    get,
    path = "/api/stock-sessions",
    tag = "Stock",
    responses((status = 200, description = "Sessões com movimentações", body = Vec<StockSessionDetail>)),
    security(("api_jwt" = []))
)]
pub async fn list_sessions(
    State(app_state): State<AppState>,
    gate: Gated<ops::ViewStockSessions>,
    Query(filter): Query<SessionFilter>,
) -> Result<Json<Vec<StockSessionDetail>>, AppError> {
    let sessions = app_state.stock_service.list_sessions(gate.butcher_id(), &filter).await?;
    Ok(Json(sessions))
}
