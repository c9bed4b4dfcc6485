// src/db/memory.rs
//
// Armazenamento em memória para os testes dos serviços. Cada método segura o
// mutex do começo ao fim, o que dá a mesma atomicidade das transações do Postgres.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{CodeDeletion, LicenseStore, NewUnlockCode, SaleStore, StockStore, TenantScope},
    models::{
        license::{
            CodeFilter, CodeStats, CodeUsage, License, LicenseStatus, UnlockCode,
            DEFAULT_LICENSE_PLAN, DEFAULT_PAYMENT_LIMIT,
        },
        sales::{InsertOutcome, NewSale, Sale, SaleDetail, SaleFilter, SaleItem, SaleKey},
        stock::{
            CloseSession, OpenSession, SessionFilter, StockMovement, StockSession,
            StockSessionDetail, StockSessionStatus,
        },
    },
};

#[derive(Default)]
struct State {
    products: HashMap<Uuid, (Uuid, String)>,
    users: HashMap<Uuid, Uuid>,
    sales: Vec<SaleDetail>,
    licenses: HashMap<Uuid, License>,
    codes: Vec<UnlockCode>,
    sessions: Vec<StockSession>,
    movements: Vec<StockMovement>,
    // Vendas cuja gravação deve falhar (simula erro de banco no meio da unidade)
    failing_sales: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("mutex envenenado")
    }

    pub fn add_product(&self, butcher_id: Uuid, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().products.insert(id, (butcher_id, name.to_string()));
        id
    }

    pub fn add_user(&self, butcher_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().users.insert(id, butcher_id);
        id
    }

    pub fn fail_sale(&self, sale_number: &str) {
        self.lock().failing_sales.insert(sale_number.to_string());
    }

    pub fn set_license(&self, butcher_id: Uuid, payment_count: i64, payment_limit: i64, status: LicenseStatus) {
        let mut state = self.lock();
        let license = license_entry(&mut state, butcher_id);
        license.payment_count = payment_count;
        license.payment_limit = payment_limit;
        license.status = status;
    }

    pub fn sale_count(&self, butcher_id: Uuid) -> usize {
        self.lock().sales.iter().filter(|s| s.sale.butcher_id == butcher_id).count()
    }

    pub fn movements_of(&self, session_id: Uuid) -> Vec<StockMovement> {
        self.lock()
            .movements
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn session_count(&self, butcher_id: Uuid) -> usize {
        self.lock().sessions.iter().filter(|s| s.butcher_id == butcher_id).count()
    }
}

fn license_entry(state: &mut State, butcher_id: Uuid) -> &mut License {
    state.licenses.entry(butcher_id).or_insert_with(|| {
        let now = Utc::now();
        License {
            id: Uuid::new_v4(),
            butcher_id,
            plan: DEFAULT_LICENSE_PLAN.to_string(),
            status: LicenseStatus::Active,
            payment_count: 0,
            payment_limit: DEFAULT_PAYMENT_LIMIT,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    })
}

fn matches_key(sale: &Sale, key: &SaleKey) -> bool {
    match key {
        SaleKey::DeviceSaleId(id) => sale.device_sale_id.as_deref() == Some(id.as_str()),
        SaleKey::SaleNumber(number) => sale.sale_number.as_deref() == Some(number.as_str()),
    }
}

// Mesmas restrições únicas das duas chaves no banco
fn collides(sale: &Sale, new_sale: &NewSale) -> bool {
    matches_key(sale, &new_sale.key)
        || new_sale
            .sale_number
            .as_deref()
            .is_some_and(|number| sale.sale_number.as_deref() == Some(number))
}

#[async_trait]
impl TenantScope for MemoryStore {
    async fn product_names(
        &self,
        butcher_id: Uuid,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, String>, AppError> {
        let state = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| match state.products.get(id) {
                Some((owner, name)) if *owner == butcher_id => Some((*id, name.clone())),
                _ => None,
            })
            .collect())
    }

    async fn user_in_shop(&self, butcher_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self.lock().users.get(&user_id) == Some(&butcher_id))
    }
}

#[async_trait]
impl SaleStore for MemoryStore {
    async fn find_by_device_sale_id(
        &self,
        butcher_id: Uuid,
        device_sale_id: &str,
    ) -> Result<Option<SaleDetail>, AppError> {
        let key = SaleKey::DeviceSaleId(device_sale_id.to_string());
        Ok(self
            .lock()
            .sales
            .iter()
            .find(|s| s.sale.butcher_id == butcher_id && matches_key(&s.sale, &key))
            .cloned())
    }

    async fn insert_metered(&self, new_sale: &NewSale) -> Result<InsertOutcome, AppError> {
        let mut state = self.lock();

        let same_shop = state.sales.iter().filter(|s| s.sale.butcher_id == new_sale.butcher_id);
        let existing = same_shop
            .clone()
            .find(|s| matches_key(&s.sale, &new_sale.key))
            .or_else(|| same_shop.clone().find(|s| collides(&s.sale, new_sale)));
        if let Some(existing) = existing {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }

        if let Some(number) = &new_sale.sale_number {
            if state.failing_sales.contains(number) {
                return Err(anyhow::anyhow!("falha simulada ao gravar itens").into());
            }
        }

        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4(),
            butcher_id: new_sale.butcher_id,
            user_id: new_sale.user_id,
            device_sale_id: new_sale.device_sale_id().map(str::to_string),
            sale_number: new_sale.sale_number.clone(),
            total_amount: new_sale.total_amount,
            payment_method: new_sale.payment_method.clone(),
            sale_date: new_sale.sale_date,
            synced_at: Some(now),
            created_at: now,
        };
        let items = new_sale
            .items
            .iter()
            .map(|item| SaleItem {
                id: Uuid::new_v4(),
                sale_id: sale.id,
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                weight_grams: item.weight_grams,
                price_per_kg: item.price_per_kg,
                total_price: item.total_price,
            })
            .collect();
        let detail = SaleDetail { sale, items };
        state.sales.push(detail.clone());

        let license = license_entry(&mut state, new_sale.butcher_id);
        license.payment_count += 1;
        if license.payment_count >= license.payment_limit {
            license.status = LicenseStatus::Locked;
        }

        Ok(InsertOutcome::Inserted(detail))
    }

    async fn list(&self, butcher_id: Uuid, filter: &SaleFilter) -> Result<Vec<SaleDetail>, AppError> {
        let state = self.lock();
        let mut sales: Vec<SaleDetail> = state
            .sales
            .iter()
            .filter(|s| s.sale.butcher_id == butcher_id)
            .filter(|s| filter.from_date.is_none_or(|d| s.sale.sale_date.date_naive() >= d))
            .filter(|s| filter.to_date.is_none_or(|d| s.sale.sale_date.date_naive() <= d))
            .filter(|s| filter.user_id.is_none_or(|u| s.sale.user_id == u))
            .filter(|s| {
                filter
                    .payment_method
                    .as_deref()
                    .is_none_or(|m| s.sale.payment_method == m)
            })
            .cloned()
            .collect();
        sales.sort_by(|a, b| b.sale.sale_date.cmp(&a.sale.sale_date));
        Ok(sales)
    }

    async fn get(&self, butcher_id: Uuid, sale_id: Uuid) -> Result<Option<SaleDetail>, AppError> {
        Ok(self
            .lock()
            .sales
            .iter()
            .find(|s| s.sale.id == sale_id && s.sale.butcher_id == butcher_id)
            .cloned())
    }
}

fn push_movements(state: &mut State, session_id: Uuid, movements: &[crate::models::stock::NewStockMovement]) {
    for m in movements {
        state.movements.push(StockMovement {
            id: Uuid::new_v4(),
            session_id,
            product_id: m.product_id,
            product_name: m.product_name.clone(),
            opening_grams: m.opening_grams,
            sold_grams: m.sold_grams,
            closing_grams: m.closing_grams,
            expected_closing_grams: m.expected_closing_grams,
            variance_grams: m.variance_grams,
        });
    }
}

#[async_trait]
impl StockStore for MemoryStore {
    async fn open(&self, open: &OpenSession) -> Result<StockSession, AppError> {
        let mut state = self.lock();
        let now = Utc::now();
        let session = StockSession {
            id: Uuid::new_v4(),
            butcher_id: open.butcher_id,
            user_id: open.user_id,
            local_session_id: open.local_session_id,
            status: StockSessionStatus::Open,
            notes: None,
            opened_at: open.opened_at,
            closed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.sessions.push(session.clone());
        push_movements(&mut state, session.id, &open.movements);
        Ok(session)
    }

    async fn close(&self, close: &CloseSession) -> Result<StockSession, AppError> {
        let mut state = self.lock();
        let now = Utc::now();

        let existing = state
            .sessions
            .iter_mut()
            .filter(|s| {
                s.butcher_id == close.butcher_id && s.local_session_id == Some(close.local_session_id)
            })
            .max_by_key(|s| (s.opened_at, s.created_at));

        let session = match existing {
            Some(found) => {
                found.status = StockSessionStatus::Closed;
                found.closed_at = Some(close.closed_at);
                found.notes = close.notes.clone();
                found.updated_at = now;
                found.clone()
            }
            None => {
                let created = StockSession {
                    id: Uuid::new_v4(),
                    butcher_id: close.butcher_id,
                    user_id: close.user_id,
                    local_session_id: Some(close.local_session_id),
                    status: StockSessionStatus::Closed,
                    notes: close.notes.clone(),
                    opened_at: close.opened_at,
                    closed_at: Some(close.closed_at),
                    created_at: now,
                    updated_at: now,
                };
                state.sessions.push(created.clone());
                created
            }
        };

        state.movements.retain(|m| m.session_id != session.id);
        push_movements(&mut state, session.id, &close.movements);
        Ok(session)
    }

    async fn list(
        &self,
        butcher_id: Uuid,
        filter: &SessionFilter,
    ) -> Result<Vec<StockSessionDetail>, AppError> {
        let state = self.lock();
        Ok(state
            .sessions
            .iter()
            .filter(|s| s.butcher_id == butcher_id)
            .filter(|s| filter.status.is_none_or(|st| s.status == st))
            .filter(|s| filter.from_date.is_none_or(|d| s.opened_at.date_naive() >= d))
            .filter(|s| filter.to_date.is_none_or(|d| s.opened_at.date_naive() <= d))
            .map(|s| {
                let movements = state
                    .movements
                    .iter()
                    .filter(|m| m.session_id == s.id)
                    .cloned()
                    .collect();
                StockSessionDetail::new(s.clone(), movements)
            })
            .collect())
    }
}

#[async_trait]
impl LicenseStore for MemoryStore {
    async fn get_or_create(&self, butcher_id: Uuid) -> Result<License, AppError> {
        let mut state = self.lock();
        Ok(license_entry(&mut state, butcher_id).clone())
    }

    async fn redeem(
        &self,
        butcher_id: Uuid,
        code: &str,
        strict: bool,
    ) -> Result<Option<(License, UnlockCode)>, AppError> {
        let mut state = self.lock();
        let now = Utc::now();

        let Some(claimed) = state.codes.iter_mut().find(|c| {
            c.code == code
                && !c.is_used
                && c.expires_at.is_none_or(|exp| exp > now)
                && (!strict || c.butcher_id.is_none_or(|owner| owner == butcher_id))
        }) else {
            return Ok(None);
        };
        claimed.is_used = true;
        claimed.used_at = Some(now);
        claimed.butcher_id = Some(butcher_id);
        let claimed = claimed.clone();

        let license = license_entry(&mut state, butcher_id);
        license.payment_limit += claimed.additional_payments;
        license.status = LicenseStatus::Active;
        license.updated_at = now;

        Ok(Some((license.clone(), claimed)))
    }

    async fn insert_code(&self, code: &NewUnlockCode) -> Result<Option<UnlockCode>, AppError> {
        let mut state = self.lock();
        if state.codes.iter().any(|c| c.code == code.code) {
            return Ok(None);
        }
        let created = UnlockCode {
            id: Uuid::new_v4(),
            code: code.code.clone(),
            butcher_id: code.butcher_id,
            additional_payments: code.additional_payments,
            is_used: false,
            used_at: None,
            expires_at: code.expires_at,
            created_at: Utc::now(),
        };
        state.codes.push(created.clone());
        Ok(Some(created))
    }

    async fn list_codes(&self, filter: &CodeFilter) -> Result<Vec<UnlockCode>, AppError> {
        let state = self.lock();
        Ok(state
            .codes
            .iter()
            .filter(|c| filter.butcher_id.is_none_or(|b| c.butcher_id == Some(b)))
            .filter(|c| match filter.status {
                Some(CodeUsage::Used) => c.is_used,
                Some(CodeUsage::Unused) => !c.is_used,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn code_stats(&self) -> Result<CodeStats, AppError> {
        let state = self.lock();
        let used = state.codes.iter().filter(|c| c.is_used).count() as i64;
        Ok(CodeStats {
            total_codes: state.codes.len() as i64,
            used_codes: used,
            unused_codes: state.codes.len() as i64 - used,
        })
    }

    async fn delete_unused_code(&self, code_id: Uuid) -> Result<CodeDeletion, AppError> {
        let mut state = self.lock();
        match state.codes.iter().position(|c| c.id == code_id) {
            None => Ok(CodeDeletion::Missing),
            Some(idx) if state.codes[idx].is_used => Ok(CodeDeletion::AlreadyUsed),
            Some(idx) => {
                state.codes.remove(idx);
                Ok(CodeDeletion::Deleted)
            }
        }
    }
}
