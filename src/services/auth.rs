// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::auth::{AuthResponse, Claims, CreateStaffPayload, Role, User},
};

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    jwt_secret: String,
    token_ttl_days: i64,
}

/// Gera o hash fora do runtime async (bcrypt é caro de propósito).
pub(crate) async fn hash_password(password: &str) -> Result<String, AppError> {
    let password_clone = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
    Ok(hashed)
}

impl AuthService {
    pub fn new(user_repo: UserRepository, jwt_secret: String, token_ttl_days: i64) -> Self {
        Self { user_repo, jwt_secret, token_ttl_days }
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let user = self
            .user_repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid =
            tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
                .await
                .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AppError::AccountInactive);
        }

        tracing::info!(user_id = %user.id, role = ?user.role, "Login realizado");

        let token = self.create_token(user.id)?;
        Ok(AuthResponse { token, user })
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|_| AppError::InvalidToken)?;

        self.user_repo
            .find_by_id(token_data.claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)
    }

    /// O dono cadastra gerentes e caixas da própria loja.
    pub async fn create_staff(&self, butcher_id: Uuid, payload: &CreateStaffPayload) -> Result<User, AppError> {
        if !matches!(payload.role, Role::Manager | Role::Cashier) {
            return Err(AppError::invalid("role", "Só é possível cadastrar gerentes ou caixas."));
        }

        let hashed_password = hash_password(&payload.password).await?;
        let user = self
            .user_repo
            .create_user(
                self.user_repo.pool(),
                Some(butcher_id),
                &payload.name,
                &payload.email,
                payload.username.as_deref(),
                &hashed_password,
                payload.role,
            )
            .await?;

        tracing::info!(butcher_id = %butcher_id, user_id = %user.id, role = ?user.role, "Funcionário cadastrado");
        Ok(user)
    }

    pub async fn list_staff(&self, butcher_id: Uuid) -> Result<Vec<User>, AppError> {
        self.user_repo.list_by_shop(butcher_id).await
    }

    pub async fn toggle_staff(&self, butcher_id: Uuid, user_id: Uuid) -> Result<User, AppError> {
        self.user_repo
            .toggle_active(butcher_id, user_id)
            .await?
            .ok_or(AppError::NotFound("Funcionário"))
    }

    /// Cria o Super Admin configurado, se ainda não existir.
    pub async fn ensure_super_admin(&self, email: &str, password: &str) -> Result<(), AppError> {
        if self.user_repo.find_by_email(email).await?.is_some() {
            return Ok(());
        }

        let hashed_password = hash_password(password).await?;
        self.user_repo
            .create_user(
                self.user_repo.pool(),
                None,
                "Super Admin",
                email,
                None,
                &hashed_password,
                Role::SuperAdmin,
            )
            .await?;

        tracing::info!(email = %email, "Super Admin criado");
        Ok(())
    }

    fn create_token(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(self.token_ttl_days);

        let claims = Claims {
            sub: user_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}
