use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// Taxonomia de erros da aplicação. Falhas de regra de negócio viram respostas
// tipadas; falhas de banco sobem como erro genérico (500).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Erro de campo detectado fora do `validator` (ex: produto de outra loja)
    #[error("Entrada inválida em '{field}': {message}")]
    InvalidInput { field: String, message: String },

    #[error("{0} não encontrado")]
    NotFound(&'static str),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Conta desativada")]
    AccountInactive,

    #[error("Permissão negada")]
    Forbidden,

    #[error("Nenhuma loja associada à conta")]
    NoShop,

    #[error("Assinatura suspensa")]
    SubscriptionSuspended,

    #[error("Assinatura expirada")]
    SubscriptionExpired,

    #[error("Licença travada")]
    LicenseLocked,

    #[error("Código de desbloqueio inválido")]
    InvalidUnlockCode,

    #[error("Plano obrigatório")]
    PlanRequired,

    #[error("Plano em uso")]
    PlanInUse,

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::InvalidInput { field: field.into(), message: message.into() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação, campo a campo
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                // Erros de itens aninhados (sales[0].items[1]...) não aparecem em field_errors()
                let nested: Vec<String> = errors
                    .errors()
                    .iter()
                    .filter(|(_, kind)| !matches!(kind, validator::ValidationErrorsKind::Field(_)))
                    .map(|(field, _)| field.to_string())
                    .collect();
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                    "nested": nested,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::InvalidInput { field, message } => {
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": { (field): [message] },
                }));
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }
            AppError::NotFound(entity) => {
                let body = Json(json!({ "error": format!("{} não encontrado.", entity) }));
                return (StatusCode::NOT_FOUND, body).into_response();
            }
            AppError::EmailAlreadyExists => (StatusCode::CONFLICT, "Este e-mail já está em uso."),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "E-mail ou senha inválidos."),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "Token de autenticação inválido ou ausente."),
            AppError::AccountInactive => (
                StatusCode::FORBIDDEN,
                "Sua conta foi desativada. Procure o administrador.",
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Você não tem permissão para acessar este recurso."),
            AppError::NoShop => (StatusCode::FORBIDDEN, "Nenhuma loja associada à sua conta."),
            AppError::SubscriptionSuspended => (
                StatusCode::FORBIDDEN,
                "Sua loja foi suspensa. Procure o administrador.",
            ),
            AppError::SubscriptionExpired => (
                StatusCode::FORBIDDEN,
                "Sua assinatura expirou. Procure o administrador.",
            ),
            AppError::LicenseLocked => (
                StatusCode::FORBIDDEN,
                "Limite de pagamentos da licença atingido. Use um código de desbloqueio.",
            ),
            AppError::InvalidUnlockCode => (StatusCode::BAD_REQUEST, "Código de desbloqueio inválido."),
            AppError::PlanRequired => (StatusCode::UNPROCESSABLE_ENTITY, "É obrigatório informar um plano."),
            AppError::PlanInUse => (
                StatusCode::CONFLICT,
                "O plano está em uso e não pode ser alterado ou removido.",
            ),

            // Todos os outros erros (DatabaseError, InternalServerError...) viram 500.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.")
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_failures_map_to_distinct_statuses() {
        assert_eq!(AppError::LicenseLocked.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::InvalidUnlockCode.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("Venda").into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InvalidToken.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::PlanInUse.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn storage_failures_are_generic_500() {
        let err = AppError::DatabaseError(sqlx::Error::RowNotFound);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
