// src/services/sync_service.rs

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::SaleStore,
    models::sales::{
        DailySalesEntry, InsertOutcome, NewSale, NewSaleItem, PaymentMethodTotal, ReportQuery,
        SaleDetail, SaleFilter, SaleKey, SaleListing, SalesReport, SalesSummary, SubmitSalePayload,
        SyncOutcome, SyncSalesPayload,
    },
};

#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn SaleStore>,
}

impl SyncService {
    pub fn new(store: Arc<dyn SaleStore>) -> Self {
        Self { store }
    }

    /// Todos os produtos precisam ser da loja; devolve o nome atual de cada um.
    async fn resolve_products(
        &self,
        butcher_id: Uuid,
        ids: impl Iterator<Item = Uuid>,
    ) -> Result<HashMap<Uuid, String>, AppError> {
        let unique: Vec<Uuid> = ids.collect::<HashSet<_>>().into_iter().collect();
        let names = self.store.product_names(butcher_id, &unique).await?;
        if names.len() != unique.len() {
            return Err(AppError::NotFound("Produto"));
        }
        Ok(names)
    }

    async fn ensure_user(&self, butcher_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        if !self.store.user_in_shop(butcher_id, user_id).await? {
            return Err(AppError::NotFound("Usuário"));
        }
        Ok(())
    }

    // ---
    // Venda avulsa (chave: device_sale_id)
    // ---

    /// Idempotente: reenviar a mesma venda devolve a gravada.
    /// O `bool` indica se a venda foi criada agora.
    pub async fn submit_sale(
        &self,
        butcher_id: Uuid,
        caller_id: Uuid,
        payload: SubmitSalePayload,
    ) -> Result<(SaleDetail, bool), AppError> {
        payload.validate()?;

        let user_id = payload.user_id.unwrap_or(caller_id);
        self.ensure_user(butcher_id, user_id).await?;
        let names = self
            .resolve_products(butcher_id, payload.items.iter().map(|i| i.product_id))
            .await?;

        // Reenvio comum: responde sem abrir transação
        if let Some(existing) = self
            .store
            .find_by_device_sale_id(butcher_id, &payload.device_sale_id)
            .await?
        {
            tracing::debug!(butcher_id = %butcher_id, device_sale_id = %payload.device_sale_id, "Venda já sincronizada");
            return Ok((existing, false));
        }

        let items = payload
            .items
            .into_iter()
            .map(|item| NewSaleItem {
                product_name: item
                    .product_name
                    .filter(|n| !n.trim().is_empty())
                    .or_else(|| names.get(&item.product_id).cloned())
                    .unwrap_or_default(),
                product_id: item.product_id,
                weight_grams: item.weight_grams,
                price_per_kg: item.price_per_kg,
                total_price: item.total_price,
            })
            .collect();

        let new_sale = NewSale {
            butcher_id,
            user_id,
            key: SaleKey::DeviceSaleId(payload.device_sale_id),
            sale_number: payload.sale_number,
            total_amount: payload.total_amount,
            payment_method: payload.payment_method,
            sale_date: payload.sale_date,
            items,
        };

        match self.store.insert_metered(&new_sale).await? {
            InsertOutcome::Inserted(detail) => Ok((detail, true)),
            // Outra requisição venceu a corrida pela mesma chave
            InsertOutcome::Existing(detail) => Ok((detail, false)),
        }
    }

    // ---
    // Sincronização em lote (chave: sale_number)
    // ---

    /// Valida o lote inteiro antes de gravar; depois grava em ordem, pulando
    /// duplicadas e seguindo em frente quando a unidade de uma venda falha.
    pub async fn submit_batch(&self, butcher_id: Uuid, payload: SyncSalesPayload) -> Result<SyncOutcome, AppError> {
        payload.validate()?;

        if payload.sales.iter().any(|s| s.butcher_id.is_some_and(|b| b != butcher_id)) {
            return Err(AppError::NotFound("Loja"));
        }
        let users: HashSet<Uuid> = payload.sales.iter().map(|s| s.user_id).collect();
        for user_id in users {
            self.ensure_user(butcher_id, user_id).await?;
        }
        let product_ids: Vec<Uuid> =
            payload.sales.iter().flat_map(|s| s.items.iter().map(|i| i.product_id)).collect();
        self.resolve_products(butcher_id, product_ids.into_iter()).await?;

        let mut outcome = SyncOutcome::default();

        for entry in payload.sales {
            let sale_number = entry.sale_number.clone();
            let new_sale = NewSale {
                butcher_id,
                user_id: entry.user_id,
                key: SaleKey::SaleNumber(entry.sale_number.clone()),
                sale_number: Some(entry.sale_number),
                total_amount: entry.total_amount,
                payment_method: entry.payment_method,
                sale_date: entry.created_at,
                items: entry
                    .items
                    .into_iter()
                    .map(|item| NewSaleItem {
                        product_id: item.product_id,
                        product_name: item.product_name,
                        weight_grams: item.weight_grams,
                        price_per_kg: item.price_per_kg,
                        total_price: item.total_price,
                    })
                    .collect(),
            };

            match self.store.insert_metered(&new_sale).await {
                Ok(InsertOutcome::Inserted(_)) => {
                    outcome.synced_count += 1;
                    outcome.synced_sale_numbers.push(sale_number);
                }
                Ok(InsertOutcome::Existing(_)) => outcome.skipped_count += 1,
                Err(e) => {
                    tracing::warn!(butcher_id = %butcher_id, sale_number = %sale_number, error = %e, "Venda do lote descartada");
                    outcome.failed_sale_numbers.push(sale_number);
                }
            }
        }

        tracing::info!(
            butcher_id = %butcher_id,
            synced = outcome.synced_count,
            skipped = outcome.skipped_count,
            failed = outcome.failed_sale_numbers.len(),
            "Lote de vendas sincronizado"
        );
        Ok(outcome)
    }

    // ---
    // Leituras
    // ---

    pub async fn list_sales(&self, butcher_id: Uuid, filter: &SaleFilter) -> Result<SaleListing, AppError> {
        let sales = self.store.list(butcher_id, filter).await?;
        let summary = summarize(&sales);
        Ok(SaleListing { sales, summary })
    }

    pub async fn get_sale(&self, butcher_id: Uuid, sale_id: Uuid) -> Result<SaleDetail, AppError> {
        self.store
            .get(butcher_id, sale_id)
            .await?
            .ok_or(AppError::NotFound("Venda"))
    }

    pub async fn sales_report(&self, butcher_id: Uuid, query: &ReportQuery) -> Result<SalesReport, AppError> {
        query.validate()?;
        let filter = SaleFilter {
            from_date: Some(query.date_from),
            to_date: Some(query.date_to),
            ..Default::default()
        };
        let sales = self.store.list(butcher_id, &filter).await?;
        Ok(build_report(query.date_from, query.date_to, &sales))
    }
}

fn by_payment_method(sales: &[SaleDetail]) -> Vec<PaymentMethodTotal> {
    let mut totals: BTreeMap<&str, (i64, Decimal)> = BTreeMap::new();
    for detail in sales {
        let entry = totals.entry(detail.sale.payment_method.as_str()).or_default();
        entry.0 += 1;
        entry.1 += detail.sale.total_amount;
    }
    totals
        .into_iter()
        .map(|(method, (count, total))| PaymentMethodTotal {
            payment_method: method.to_string(),
            count,
            total,
        })
        .collect()
}

pub fn summarize(sales: &[SaleDetail]) -> SalesSummary {
    SalesSummary {
        total_amount: sales.iter().map(|s| s.sale.total_amount).sum(),
        total_transactions: sales.len(),
        by_payment_method: by_payment_method(sales),
    }
}

pub fn build_report(date_from: NaiveDate, date_to: NaiveDate, sales: &[SaleDetail]) -> SalesReport {
    let mut daily: BTreeMap<NaiveDate, (i64, Decimal)> = BTreeMap::new();
    for detail in sales {
        let entry = daily.entry(detail.sale.sale_date.date_naive()).or_default();
        entry.0 += 1;
        entry.1 += detail.sale.total_amount;
    }

    SalesReport {
        date_from,
        date_to,
        total_sales: sales.len() as i64,
        total_revenue: sales.iter().map(|s| s.sale.total_amount).sum(),
        by_payment_method: by_payment_method(sales),
        daily_breakdown: daily
            .into_iter()
            .map(|(date, (count, total))| DailySalesEntry { date, count, total })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::{
        db::{memory::MemoryStore, LicenseStore},
        models::{
            license::LicenseStatus,
            sales::{SaleItemPayload, SyncItemEntry, SyncSaleEntry},
        },
    };

    struct Shop {
        store: Arc<MemoryStore>,
        sync: SyncService,
        butcher_id: Uuid,
        cashier: Uuid,
        beef: Uuid,
    }

    fn shop() -> Shop {
        let store = Arc::new(MemoryStore::new());
        let butcher_id = Uuid::new_v4();
        let cashier = store.add_user(butcher_id);
        let beef = store.add_product(butcher_id, "Beef");
        Shop {
            sync: SyncService::new(store.clone()),
            store,
            butcher_id,
            cashier,
            beef,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn single(shop: &Shop, device_sale_id: &str) -> SubmitSalePayload {
        SubmitSalePayload {
            device_sale_id: device_sale_id.into(),
            sale_number: None,
            user_id: None,
            total_amount: Decimal::new(1250, 2),
            payment_method: "cash".into(),
            sale_date: at(10, 9),
            items: vec![SaleItemPayload {
                product_id: shop.beef,
                product_name: None,
                weight_grams: 500,
                price_per_kg: Decimal::new(2500, 2),
                total_price: Decimal::new(1250, 2),
            }],
        }
    }

    fn entry(shop: &Shop, sale_number: &str, method: &str, when: DateTime<Utc>) -> SyncSaleEntry {
        SyncSaleEntry {
            butcher_id: Some(shop.butcher_id),
            user_id: shop.cashier,
            sale_number: sale_number.into(),
            total_amount: Decimal::new(1000, 2),
            payment_method: method.into(),
            created_at: when,
            items: vec![SyncItemEntry {
                product_id: shop.beef,
                product_name: "Beef".into(),
                weight_grams: 400,
                price_per_kg: Decimal::new(2500, 2),
                total_price: Decimal::new(1000, 2),
            }],
        }
    }

    fn batch(shop: &Shop, numbers: &[&str]) -> SyncSalesPayload {
        SyncSalesPayload {
            sales: numbers.iter().map(|n| entry(shop, n, "cash", at(10, 12))).collect(),
        }
    }

    #[tokio::test]
    async fn resubmitted_single_sale_returns_the_same_record() {
        let shop = shop();

        let (first, created) = shop.sync.submit_sale(shop.butcher_id, shop.cashier, single(&shop, "dev-1-0001")).await.unwrap();
        let (second, created_again) = shop.sync.submit_sale(shop.butcher_id, shop.cashier, single(&shop, "dev-1-0001")).await.unwrap();

        assert!(created);
        assert!(!created_again);
        assert_eq!(first.sale.id, second.sale.id);
        assert_eq!(first.sale.total_amount, second.sale.total_amount);
        assert_eq!(second.items.len(), 1);
        // Nome ausente no payload vem do catálogo
        assert_eq!(second.items[0].product_name, "Beef");
        assert_eq!(shop.store.sale_count(shop.butcher_id), 1);

        let license = shop.store.get_or_create(shop.butcher_id).await.unwrap();
        assert_eq!(license.payment_count, 1);
    }

    #[tokio::test]
    async fn resubmitted_batch_only_syncs_new_sales() {
        let shop = shop();

        let first = shop.sync.submit_batch(shop.butcher_id, batch(&shop, &["S-1", "S-2", "S-3"])).await.unwrap();
        assert_eq!(first.synced_count, 3);

        let second = shop
            .sync
            .submit_batch(shop.butcher_id, batch(&shop, &["S-1", "S-2", "S-3", "S-4"]))
            .await
            .unwrap();

        assert_eq!(second.synced_count, 1);
        assert_eq!(second.synced_sale_numbers, vec!["S-4".to_string()]);
        assert_eq!(second.skipped_count, 3);
        assert_eq!(shop.store.sale_count(shop.butcher_id), 4);
        assert_eq!(shop.store.get_or_create(shop.butcher_id).await.unwrap().payment_count, 4);
    }

    #[tokio::test]
    async fn single_sale_reusing_a_batch_sale_number_returns_the_batch_sale() {
        let shop = shop();
        shop.sync.submit_batch(shop.butcher_id, batch(&shop, &["S-1"])).await.unwrap();

        let mut payload = single(&shop, "dev-1-0009");
        payload.sale_number = Some("S-1".into());
        let (first, created) = shop.sync.submit_sale(shop.butcher_id, shop.cashier, payload).await.unwrap();

        let mut retry = single(&shop, "dev-1-0009");
        retry.sale_number = Some("S-1".into());
        let (second, created_again) = shop.sync.submit_sale(shop.butcher_id, shop.cashier, retry).await.unwrap();

        assert!(!created);
        assert!(!created_again);
        assert_eq!(first.sale.sale_number.as_deref(), Some("S-1"));
        assert_eq!(first.sale.id, second.sale.id);
        assert_eq!(shop.store.sale_count(shop.butcher_id), 1);
        assert_eq!(shop.store.get_or_create(shop.butcher_id).await.unwrap().payment_count, 1);
    }

    #[tokio::test]
    async fn hundredth_sale_locks_the_license() {
        let shop = shop();
        let numbers: Vec<String> = (1..=100).map(|n| format!("S-{n:03}")).collect();

        for (i, number) in numbers.iter().enumerate() {
            shop.sync.submit_batch(shop.butcher_id, batch(&shop, &[number.as_str()])).await.unwrap();
            let license = shop.store.get_or_create(shop.butcher_id).await.unwrap();
            assert_eq!(license.payment_count, i as i64 + 1);
            assert_eq!(license.is_locked(), i == 99);
        }

        let license = shop.store.get_or_create(shop.butcher_id).await.unwrap();
        assert_eq!(license.status, LicenseStatus::Locked);
    }

    #[tokio::test]
    async fn failed_entry_does_not_stop_the_batch() {
        let shop = shop();
        shop.store.fail_sale("S-2");

        let outcome = shop.sync.submit_batch(shop.butcher_id, batch(&shop, &["S-1", "S-2", "S-3"])).await.unwrap();

        assert_eq!(outcome.synced_sale_numbers, vec!["S-1".to_string(), "S-3".to_string()]);
        assert_eq!(outcome.failed_sale_numbers, vec!["S-2".to_string()]);
        assert_eq!(shop.store.get_or_create(shop.butcher_id).await.unwrap().payment_count, 2);
    }

    #[tokio::test]
    async fn invalid_batch_is_rejected_before_any_write() {
        let shop = shop();
        let foreign_product = shop.store.add_product(Uuid::new_v4(), "Pork");

        let mut payload = batch(&shop, &["S-1", "S-2"]);
        payload.sales[1].items[0].product_id = foreign_product;
        let result = shop.sync.submit_batch(shop.butcher_id, payload).await;
        assert!(matches!(result, Err(AppError::NotFound("Produto"))));

        let mut payload = batch(&shop, &["S-1", "S-2"]);
        payload.sales[1].payment_method = "cheque".into();
        let result = shop.sync.submit_batch(shop.butcher_id, payload).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));

        let mut payload = batch(&shop, &["S-1"]);
        payload.sales[0].butcher_id = Some(Uuid::new_v4());
        let result = shop.sync.submit_batch(shop.butcher_id, payload).await;
        assert!(matches!(result, Err(AppError::NotFound("Loja"))));

        assert_eq!(shop.store.sale_count(shop.butcher_id), 0);
    }

    #[tokio::test]
    async fn single_sale_rejects_foreign_cashier_and_empty_items() {
        let shop = shop();

        let mut payload = single(&shop, "dev-1-0002");
        payload.user_id = Some(shop.store.add_user(Uuid::new_v4()));
        let result = shop.sync.submit_sale(shop.butcher_id, shop.cashier, payload).await;
        assert!(matches!(result, Err(AppError::NotFound("Usuário"))));

        let mut payload = single(&shop, "dev-1-0003");
        payload.items.clear();
        let result = shop.sync.submit_sale(shop.butcher_id, shop.cashier, payload).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));

        assert_eq!(shop.store.sale_count(shop.butcher_id), 0);
    }

    #[tokio::test]
    async fn sales_of_other_shops_are_not_found() {
        let shop = shop();
        let (sale, _) = shop.sync.submit_sale(shop.butcher_id, shop.cashier, single(&shop, "dev-1-0004")).await.unwrap();

        assert!(shop.sync.get_sale(shop.butcher_id, sale.sale.id).await.is_ok());
        assert!(matches!(
            shop.sync.get_sale(Uuid::new_v4(), sale.sale.id).await,
            Err(AppError::NotFound("Venda"))
        ));
    }

    #[tokio::test]
    async fn listing_and_report_aggregate_by_method_and_day() {
        let shop = shop();
        let payload = SyncSalesPayload {
            sales: vec![
                entry(&shop, "S-1", "cash", at(10, 9)),
                entry(&shop, "S-2", "ecocash", at(10, 15)),
                entry(&shop, "S-3", "cash", at(11, 9)),
                entry(&shop, "S-4", "cash", at(20, 9)),
            ],
        };
        shop.sync.submit_batch(shop.butcher_id, payload).await.unwrap();

        let filter = SaleFilter { payment_method: Some("cash".into()), ..Default::default() };
        let listing = shop.sync.list_sales(shop.butcher_id, &filter).await.unwrap();
        assert_eq!(listing.summary.total_transactions, 3);
        assert_eq!(listing.summary.total_amount, Decimal::new(3000, 2));

        let query = ReportQuery {
            date_from: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            date_to: NaiveDate::from_ymd_opt(2025, 3, 11).unwrap(),
        };
        let report = shop.sync.sales_report(shop.butcher_id, &query).await.unwrap();

        assert_eq!(report.total_sales, 3);
        assert_eq!(report.total_revenue, Decimal::new(3000, 2));
        assert_eq!(report.daily_breakdown.len(), 2);
        assert_eq!(report.daily_breakdown[0].count, 2);
        let methods: Vec<(&str, i64)> = report
            .by_payment_method
            .iter()
            .map(|m| (m.payment_method.as_str(), m.count))
            .collect();
        assert_eq!(methods, vec![("cash", 2), ("ecocash", 1)]);

        let backwards = ReportQuery { date_from: query.date_to, date_to: query.date_from };
        assert!(matches!(
            shop.sync.sales_report(shop.butcher_id, &backwards).await,
            Err(AppError::ValidationError(_))
        ));
    }
}
