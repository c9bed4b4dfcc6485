// src/services/stock_service.rs

use std::{collections::HashSet, sync::Arc};

use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::StockStore,
    models::stock::{
        CloseOutcome, CloseSession, CloseSessionPayload, NewStockMovement, OpenOutcome, OpenSession,
        OpenSessionPayload, ProductVariance, SessionFilter, StockSessionDetail,
    },
};

#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn StockStore>,
}

impl StockService {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    async fn check_references(
        &self,
        butcher_id: Uuid,
        user_id: Uuid,
        product_ids: impl Iterator<Item = Uuid>,
    ) -> Result<(), AppError> {
        if !self.store.user_in_shop(butcher_id, user_id).await? {
            return Err(AppError::NotFound("Usuário"));
        }
        let unique: Vec<Uuid> = product_ids.collect::<HashSet<_>>().into_iter().collect();
        let found = self.store.product_names(butcher_id, &unique).await?;
        if found.len() != unique.len() {
            return Err(AppError::NotFound("Produto"));
        }
        Ok(())
    }

    /// Sempre cria uma sessão nova; só a abertura de cada produto é gravada.
    pub async fn open_session(
        &self,
        butcher_id: Uuid,
        caller_id: Uuid,
        payload: OpenSessionPayload,
    ) -> Result<OpenOutcome, AppError> {
        payload.validate()?;
        let user_id = payload.user_id.unwrap_or(caller_id);
        self.check_references(butcher_id, user_id, payload.stock_movements.iter().map(|m| m.product_id))
            .await?;

        let open = OpenSession {
            butcher_id,
            user_id,
            local_session_id: payload.local_session_id,
            opened_at: payload.opened_at,
            movements: payload
                .stock_movements
                .into_iter()
                .map(|m| NewStockMovement {
                    product_id: m.product_id,
                    product_name: m.product_name,
                    opening_grams: m.opening_grams,
                    sold_grams: 0,
                    closing_grams: None,
                    expected_closing_grams: None,
                    variance_grams: None,
                })
                .collect(),
        };

        let session = self.store.open(&open).await?;
        tracing::info!(
            butcher_id = %butcher_id,
            session_id = %session.id,
            local_session_id = ?session.local_session_id,
            "Sessão de estoque aberta"
        );

        Ok(OpenOutcome {
            session_id: session.id,
            local_session_id: session.local_session_id,
        })
    }

    /// O fechamento é a palavra final: substitui as movimentações e confia na
    /// variação calculada pelo dispositivo.
    pub async fn close_session(
        &self,
        butcher_id: Uuid,
        caller_id: Uuid,
        payload: CloseSessionPayload,
    ) -> Result<CloseOutcome, AppError> {
        payload.validate()?;
        let user_id = payload.user_id.unwrap_or(caller_id);
        self.check_references(butcher_id, user_id, payload.stock_movements.iter().map(|m| m.product_id))
            .await?;

        let variance_by_product: Vec<ProductVariance> = payload
            .stock_movements
            .iter()
            .map(|m| ProductVariance {
                product_id: m.product_id,
                product_name: m.product_name.clone(),
                variance_grams: m.variance_grams,
            })
            .collect();
        let total_variance_grams = variance_by_product
            .iter()
            .try_fold(0i64, |acc, v| acc.checked_add(v.variance_grams))
            .ok_or_else(|| AppError::invalid("stockMovements", "Soma das variações fora do intervalo."))?;

        let close = CloseSession {
            butcher_id,
            user_id,
            local_session_id: payload.local_session_id,
            opened_at: payload.opened_at,
            closed_at: payload.closed_at,
            notes: payload.notes,
            movements: payload
                .stock_movements
                .into_iter()
                .map(|m| NewStockMovement {
                    product_id: m.product_id,
                    product_name: m.product_name,
                    opening_grams: m.opening_grams,
                    sold_grams: m.sold_grams,
                    closing_grams: Some(m.closing_grams),
                    expected_closing_grams: Some(m.expected_closing_grams),
                    variance_grams: Some(m.variance_grams),
                })
                .collect(),
        };

        let session = self.store.close(&close).await?;
        tracing::info!(
            butcher_id = %butcher_id,
            session_id = %session.id,
            local_session_id = close.local_session_id,
            total_variance_grams,
            "Sessão de estoque fechada"
        );

        Ok(CloseOutcome {
            session_id: session.id,
            total_variance_grams,
            variance_by_product,
        })
    }

    pub async fn list_sessions(
        &self,
        butcher_id: Uuid,
        filter: &SessionFilter,
    ) -> Result<Vec<StockSessionDetail>, AppError> {
        self.store.list(butcher_id, filter).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::{
        db::memory::MemoryStore,
        models::stock::{ClosingMovementPayload, OpeningMovementPayload, StockSessionStatus},
    };

    struct Counter {
        store: Arc<MemoryStore>,
        stock: StockService,
        butcher_id: Uuid,
        user_id: Uuid,
        products: Vec<Uuid>,
    }

    fn counter() -> Counter {
        let store = Arc::new(MemoryStore::new());
        let butcher_id = Uuid::new_v4();
        let user_id = store.add_user(butcher_id);
        let products: Vec<Uuid> = ["Beef", "Pork", "Chicken"]
            .iter()
            .map(|name| store.add_product(butcher_id, name))
            .collect();
        Counter {
            stock: StockService::new(store.clone()),
            store,
            butcher_id,
            user_id,
            products,
        }
    }

    fn opening(products: &[Uuid], local_session_id: i64) -> OpenSessionPayload {
        OpenSessionPayload {
            user_id: None,
            local_session_id: Some(local_session_id),
            opened_at: Utc::now() - Duration::hours(8),
            stock_movements: products
                .iter()
                .map(|id| OpeningMovementPayload {
                    product_id: *id,
                    product_name: "Produto".into(),
                    opening_grams: 10_000,
                })
                .collect(),
        }
    }

    fn closing(products: &[Uuid], variances: &[i64], local_session_id: i64) -> CloseSessionPayload {
        CloseSessionPayload {
            user_id: None,
            local_session_id,
            notes: Some("Fim do turno".into()),
            opened_at: Utc::now() - Duration::hours(8),
            closed_at: Utc::now(),
            stock_movements: products
                .iter()
                .zip(variances)
                .map(|(id, variance)| ClosingMovementPayload {
                    product_id: *id,
                    product_name: "Produto".into(),
                    opening_grams: 10_000,
                    sold_grams: 4_000,
                    closing_grams: (6_000 + variance).max(0),
                    expected_closing_grams: 6_000,
                    variance_grams: *variance,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn close_replaces_the_opening_movements() {
        let c = counter();
        let opened = c
            .stock
            .open_session(c.butcher_id, c.user_id, opening(&c.products[..2], 7))
            .await
            .unwrap();
        assert_eq!(c.store.movements_of(opened.session_id).len(), 2);

        let closed = c
            .stock
            .close_session(c.butcher_id, c.user_id, closing(&c.products, &[0, 0, 0], 7))
            .await
            .unwrap();

        assert_eq!(closed.session_id, opened.session_id);
        let movements = c.store.movements_of(closed.session_id);
        assert_eq!(movements.len(), 3);
        assert!(movements.iter().all(|m| m.closing_grams.is_some()));
        assert_eq!(c.store.session_count(c.butcher_id), 1);
    }

    #[tokio::test]
    async fn close_without_open_creates_a_closed_session() {
        let c = counter();

        let closed = c
            .stock
            .close_session(c.butcher_id, c.user_id, closing(&c.products[..1], &[25], 42))
            .await
            .unwrap();

        let sessions = c.stock.list_sessions(c.butcher_id, &SessionFilter::default()).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session.id, closed.session_id);
        assert_eq!(sessions[0].session.status, StockSessionStatus::Closed);
        assert_eq!(sessions[0].session.local_session_id, Some(42));
        assert_eq!(sessions[0].stock_movements.len(), 1);
        assert_eq!(sessions[0].total_variance_grams, 25);
    }

    #[tokio::test]
    async fn variance_is_summed_and_reported_per_product() {
        let c = counter();

        let closed = c
            .stock
            .close_session(c.butcher_id, c.user_id, closing(&c.products, &[-10, 5, 0], 3))
            .await
            .unwrap();

        assert_eq!(closed.total_variance_grams, -5);
        let breakdown: Vec<(Uuid, i64)> = closed
            .variance_by_product
            .iter()
            .map(|v| (v.product_id, v.variance_grams))
            .collect();
        assert_eq!(breakdown, vec![(c.products[0], -10), (c.products[1], 5), (c.products[2], 0)]);
    }

    #[tokio::test]
    async fn repeated_opens_are_distinct_sessions() {
        let c = counter();

        let first = c.stock.open_session(c.butcher_id, c.user_id, opening(&c.products, 9)).await.unwrap();
        let second = c.stock.open_session(c.butcher_id, c.user_id, opening(&c.products, 9)).await.unwrap();

        assert_ne!(first.session_id, second.session_id);
        assert_eq!(c.store.session_count(c.butcher_id), 2);

        let open = SessionFilter { status: Some(StockSessionStatus::Open), ..Default::default() };
        assert_eq!(c.stock.list_sessions(c.butcher_id, &open).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn foreign_products_are_rejected_before_writing() {
        let c = counter();
        let foreign = c.store.add_product(Uuid::new_v4(), "Lamb");

        let result = c
            .stock
            .close_session(c.butcher_id, c.user_id, closing(&[foreign], &[0], 1))
            .await;

        assert!(matches!(result, Err(AppError::NotFound("Produto"))));
        assert_eq!(c.store.session_count(c.butcher_id), 0);
    }

    #[tokio::test]
    async fn out_of_range_variance_is_rejected_before_any_write() {
        let c = counter();

        let mut payload = closing(&c.products[..2], &[0, 0], 9);
        payload.stock_movements[0].variance_grams = i64::MAX;
        payload.stock_movements[1].variance_grams = i64::MAX;
        let result = c.stock.close_session(c.butcher_id, c.user_id, payload).await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(c.store.session_count(c.butcher_id), 0);

        let accepted = c
            .stock
            .close_session(c.butcher_id, c.user_id, closing(&c.products[..1], &[-1_000_000_000], 9))
            .await
            .unwrap();
        assert_eq!(accepted.total_variance_grams, -1_000_000_000);
    }
}
