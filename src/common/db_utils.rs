use chrono::{NaiveDate, Utc};
use rand::Rng;

/// Violação de unique (23505) vinda do Postgres.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}

/// "Hoje" para as regras de assinatura (datas sem fuso, em UTC).
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Gera `len` caracteres alfanuméricos maiúsculos, uniformes sobre A-Z0-9.
pub(crate) fn random_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())]))
        .collect()
}
