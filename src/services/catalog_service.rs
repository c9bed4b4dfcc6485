// src/services/catalog_service.rs

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ProductRepository,
    models::catalog::{Device, Product, ProductPayload, RegisterDevicePayload, UpdateProductPayload},
};

#[derive(Clone)]
pub struct CatalogService {
    product_repo: ProductRepository,
}

impl CatalogService {
    pub fn new(product_repo: ProductRepository) -> Self {
        Self { product_repo }
    }

    pub async fn list_products(&self, butcher_id: Uuid) -> Result<Vec<Product>, AppError> {
        self.product_repo.list(butcher_id).await
    }

    pub async fn create_product(&self, butcher_id: Uuid, payload: &ProductPayload) -> Result<Product, AppError> {
        self.product_repo
            .create(butcher_id, &payload.name, payload.price_per_kg, payload.is_active)
            .await
    }

    pub async fn update_product(
        &self,
        butcher_id: Uuid,
        product_id: Uuid,
        payload: &UpdateProductPayload,
    ) -> Result<Product, AppError> {
        self.product_repo
            .update(
                butcher_id,
                product_id,
                payload.name.as_deref(),
                payload.price_per_kg,
                payload.is_active,
            )
            .await?
            .ok_or(AppError::NotFound("Produto"))
    }

    // Produto já vendido é só desativado (o histórico aponta para ele)
    pub async fn delete_product(&self, butcher_id: Uuid, product_id: Uuid) -> Result<(), AppError> {
        if !self.product_repo.delete(butcher_id, product_id).await? {
            return Err(AppError::NotFound("Produto"));
        }
        Ok(())
    }

    pub async fn register_device(
        &self,
        butcher_id: Uuid,
        payload: &RegisterDevicePayload,
    ) -> Result<Device, AppError> {
        let device = self
            .product_repo
            .register_device(butcher_id, &payload.device_id, payload.name.as_deref())
            .await?;
        tracing::info!(butcher_id = %butcher_id, device_id = %device.device_id, "Dispositivo registrado");
        Ok(device)
    }
}
