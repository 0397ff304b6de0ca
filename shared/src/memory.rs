use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use crate::store::{Transaction, TxFuture, UnitOfWork};
use crate::{
    Client, ClientId, CommerceError, CommerceResult, Order, OrderId, OrderStatus, Product, ProductId, TenantId,
};

#[derive(Debug, Default, Clone)]
struct Tables {
    products: HashMap<(TenantId, ProductId), Product>,
    clients: HashMap<(TenantId, ClientId), Client>,
    orders: HashMap<(TenantId, OrderId), Order>,
}

/// In-memory store for tests/dev.
///
/// Units of work run one at a time against a private copy of the tables; the
/// copy replaces the shared tables only when the work returns `Ok`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    failing_commits: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog seeding. Products are owned by catalog management, not by the
    /// order flow, so this bypasses the unit of work.
    pub async fn insert_product(&self, product: Product) {
        let mut tables = self.tables.lock().await;
        tables.products.insert((product.tenant_id, product.id), product);
    }

    pub async fn insert_client(&self, client: Client) {
        let mut tables = self.tables.lock().await;
        tables.clients.insert((client.tenant_id, client.id), client);
    }

    pub async fn product(&self, tenant_id: TenantId, product_id: ProductId) -> Option<Product> {
        let tables = self.tables.lock().await;
        tables.products.get(&(tenant_id, product_id)).cloned()
    }

    /// Every order of every tenant placed against `product_id`.
    pub async fn orders_for_product(&self, product_id: ProductId) -> Vec<Order> {
        let tables = self.tables.lock().await;
        tables
            .orders
            .values()
            .filter(|o| o.product_id == product_id)
            .cloned()
            .collect()
    }

    /// Make the next `count` units of work fail at commit time, after their
    /// work has already run.
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    fn take_commit_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn transaction<T, F>(&self, work: F) -> CommerceResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn Transaction) -> TxFuture<'t, T> + Send + 'static,
    {
        let mut shared = self.tables.lock().await;
        let mut tx = InMemoryTransaction {
            tables: shared.clone(),
        };

        let out = work(&mut tx as &mut dyn Transaction).await?;

        if self.take_commit_failure() {
            warn!("Injected commit failure, discarding unit of work");
            return Err(CommerceError::persistence("commit failed"));
        }

        *shared = tx.tables;
        Ok(out)
    }
}

struct InMemoryTransaction {
    tables: Tables,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn lock_product(&mut self, tenant_id: TenantId, product_id: ProductId) -> CommerceResult<Option<Product>> {
        // Units of work are already serialized by the store mutex.
        self.find_product(tenant_id, product_id).await
    }

    async fn find_product(&mut self, tenant_id: TenantId, product_id: ProductId) -> CommerceResult<Option<Product>> {
        Ok(self.tables.products.get(&(tenant_id, product_id)).cloned())
    }

    async fn write_product_quantity(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i32,
        at: DateTime<Utc>,
    ) -> CommerceResult<()> {
        if quantity < 0 {
            return Err(CommerceError::persistence("products.quantity check constraint violated"));
        }

        let product = self
            .tables
            .products
            .get_mut(&(tenant_id, product_id))
            .ok_or(CommerceError::not_found("product"))?;
        product.quantity = quantity;
        product.updated_at = at;
        Ok(())
    }

    async fn client_exists(&mut self, tenant_id: TenantId, client_id: ClientId) -> CommerceResult<bool> {
        Ok(self.tables.clients.contains_key(&(tenant_id, client_id)))
    }

    async fn insert_order(&mut self, order: &Order) -> CommerceResult<()> {
        let key = (order.tenant_id, order.id);
        if self.tables.orders.contains_key(&key) {
            return Err(CommerceError::persistence(format!("duplicate order id {}", order.id)));
        }
        self.tables.orders.insert(key, order.clone());
        Ok(())
    }

    async fn lock_order(&mut self, tenant_id: TenantId, order_id: OrderId) -> CommerceResult<Option<Order>> {
        self.find_order(tenant_id, order_id).await
    }

    async fn find_order(&mut self, tenant_id: TenantId, order_id: OrderId) -> CommerceResult<Option<Order>> {
        Ok(self.tables.orders.get(&(tenant_id, order_id)).cloned())
    }

    async fn list_orders(&mut self, tenant_id: TenantId) -> CommerceResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .tables
            .orders
            .values()
            .filter(|o| o.tenant_id == tenant_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn compare_and_set_status(
        &mut self,
        tenant_id: TenantId,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> CommerceResult<bool> {
        match self.tables.orders.get_mut(&(tenant_id, order_id)) {
            Some(order) if order.status == expected => {
                order.status = next;
                order.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    async fn seeded(quantity: i32) -> (InMemoryStore, Product) {
        let store = InMemoryStore::new();
        let product = Product::new(TenantId::new(), "Chair", quantity, BigDecimal::from(40), BigDecimal::from(15)).unwrap();
        store.insert_product(product.clone()).await;
        (store, product)
    }

    #[tokio::test]
    async fn failed_work_leaves_tables_untouched() {
        let (store, product) = seeded(5).await;
        let (tenant_id, product_id) = (product.tenant_id, product.id);

        let result: CommerceResult<()> = store
            .transaction(move |tx| {
                Box::pin(async move {
                    tx.write_product_quantity(tenant_id, product_id, 1, Utc::now()).await?;
                    Err::<(), _>(CommerceError::validation("abort"))
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.product(tenant_id, product_id).await.unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn injected_commit_failure_rolls_back_once() {
        let (store, product) = seeded(5).await;
        let (tenant_id, product_id) = (product.tenant_id, product.id);
        store.fail_next_commits(1);

        for _ in 0..2 {
            let _ = store
                .transaction(move |tx| {
                    Box::pin(async move { tx.write_product_quantity(tenant_id, product_id, 3, Utc::now()).await })
                })
                .await;
        }

        // First attempt was discarded, the retry committed.
        assert_eq!(store.product(tenant_id, product_id).await.unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn rows_are_invisible_to_other_tenants() {
        let (store, product) = seeded(5).await;
        let intruder = TenantId::new();
        let product_id = product.id;

        let found = store
            .transaction(move |tx| Box::pin(async move { tx.find_product(intruder, product_id).await }))
            .await
            .unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn negative_quantity_is_refused_like_the_check_constraint() {
        let (store, product) = seeded(1).await;
        let (tenant_id, product_id) = (product.tenant_id, product.id);

        let err = store
            .transaction(move |tx| {
                Box::pin(async move { tx.write_product_quantity(tenant_id, product_id, -1, Utc::now()).await })
            })
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }
}
