use serde::Serialize;
use shared::{CommerceError, CommerceResult, Product, ProductId, TenantId, Transaction};
use tracing::{info, warn};

use crate::ledger::StockLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockRequest {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Runs inside the caller's unit of work; nothing here commits on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryService {
    ledger: StockLedger,
}

impl InventoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reserve(&self, tx: &mut dyn Transaction, request: StockRequest) -> CommerceResult<Product> {
        match self
            .ledger
            .reserve(tx, request.tenant_id, request.product_id, request.quantity)
            .await
        {
            Err(CommerceError::InsufficientStock { requested, available }) => {
                warn!(
                    "Insufficient stock for product {}: requested {}, available {}",
                    request.product_id, requested, available
                );
                Err(CommerceError::InsufficientStock { requested, available })
            }
            other => other,
        }
    }

    pub async fn release(&self, tx: &mut dyn Transaction, request: StockRequest) -> CommerceResult<Product> {
        let product = self
            .ledger
            .release(tx, request.tenant_id, request.product_id, request.quantity)
            .await?;

        info!(
            "Released {} units of product {} (available: {})",
            request.quantity, request.product_id, product.quantity
        );
        Ok(product)
    }

    pub async fn stock_level(
        &self,
        tx: &mut dyn Transaction,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> CommerceResult<StockLevel> {
        let product = tx
            .find_product(tenant_id, product_id)
            .await?
            .ok_or(CommerceError::not_found("product"))?;

        Ok(StockLevel {
            product_id: product.id,
            quantity: product.quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use shared::{InMemoryStore, UnitOfWork};

    #[tokio::test]
    async fn reserve_then_release_restores_the_level() {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        let product = Product::new(tenant_id, "Mug", 10, BigDecimal::from(8), BigDecimal::from(3)).unwrap();
        let product_id = product.id;
        store.insert_product(product).await;

        let inventory = InventoryService::new();
        let request = StockRequest { tenant_id, product_id, quantity: 2 };

        let after_reserve = store
            .transaction(move |tx| {
                Box::pin(async move {
                    inventory.reserve(tx, request).await?;
                    inventory.stock_level(tx, tenant_id, product_id).await
                })
            })
            .await
            .unwrap();
        assert_eq!(after_reserve.quantity, 8);

        let after_release = store
            .transaction(move |tx| {
                Box::pin(async move {
                    inventory.release(tx, request).await?;
                    inventory.stock_level(tx, tenant_id, product_id).await
                })
            })
            .await
            .unwrap();
        assert_eq!(after_release, StockLevel { product_id, quantity: 10 });
    }

    #[tokio::test]
    async fn stock_level_is_tenant_scoped() {
        let store = InMemoryStore::new();
        let product = Product::new(TenantId::new(), "Mug", 10, BigDecimal::from(8), BigDecimal::from(3)).unwrap();
        let product_id = product.id;
        store.insert_product(product).await;
        let intruder = TenantId::new();

        let err = store
            .transaction(move |tx| {
                Box::pin(async move { InventoryService::new().stock_level(tx, intruder, product_id).await })
            })
            .await
            .unwrap_err();

        assert_eq!(err, CommerceError::not_found("product"));
    }

    #[tokio::test]
    async fn failed_reservation_inside_a_larger_unit_rolls_back_earlier_writes() {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        let first = Product::new(tenant_id, "Mug", 5, BigDecimal::from(8), BigDecimal::from(3)).unwrap();
        let second = Product::new(tenant_id, "Plate", 1, BigDecimal::from(6), BigDecimal::from(2)).unwrap();
        let (first_id, second_id) = (first.id, second.id);
        store.insert_product(first).await;
        store.insert_product(second).await;

        let inventory = InventoryService::new();
        let err = store
            .transaction(move |tx| {
                Box::pin(async move {
                    inventory
                        .reserve(tx, StockRequest { tenant_id, product_id: first_id, quantity: 2 })
                        .await?;
                    inventory
                        .reserve(tx, StockRequest { tenant_id, product_id: second_id, quantity: 2 })
                        .await
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CommerceError::InsufficientStock { requested: 2, available: 1 }));
        assert_eq!(store.product(tenant_id, first_id).await.unwrap().quantity, 5);
    }
}
