//! Transactional boundary between the services and whatever stores the rows.
//!
//! A [`UnitOfWork`] hands a [`Transaction`] to a closure and commits only if
//! the closure returns `Ok`. Every read and write on a `Transaction` is scoped
//! by tenant; a record owned by another tenant is indistinguishable from one
//! that does not exist.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::{ClientId, CommerceResult, Order, OrderId, OrderStatus, Product, ProductId, TenantId};

pub type TxFuture<'t, T> = BoxFuture<'t, CommerceResult<T>>;

#[async_trait]
pub trait Transaction: Send {
    /// Load a product and hold an exclusive lock on it until the unit of work ends.
    async fn lock_product(&mut self, tenant_id: TenantId, product_id: ProductId) -> CommerceResult<Option<Product>>;

    async fn find_product(&mut self, tenant_id: TenantId, product_id: ProductId) -> CommerceResult<Option<Product>>;

    async fn write_product_quantity(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i32,
        at: DateTime<Utc>,
    ) -> CommerceResult<()>;

    async fn client_exists(&mut self, tenant_id: TenantId, client_id: ClientId) -> CommerceResult<bool>;

    async fn insert_order(&mut self, order: &Order) -> CommerceResult<()>;

    /// Load an order and hold an exclusive lock on it until the unit of work ends.
    async fn lock_order(&mut self, tenant_id: TenantId, order_id: OrderId) -> CommerceResult<Option<Order>>;

    async fn find_order(&mut self, tenant_id: TenantId, order_id: OrderId) -> CommerceResult<Option<Order>>;

    async fn list_orders(&mut self, tenant_id: TenantId) -> CommerceResult<Vec<Order>>;

    /// Set the status only if it still equals `expected`. Returns whether a row changed.
    async fn compare_and_set_status(
        &mut self,
        tenant_id: TenantId,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> CommerceResult<bool>;
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Commits only if `work` returns `Ok`.
    async fn transaction<T, F>(&self, work: F) -> CommerceResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn Transaction) -> TxFuture<'t, T> + Send + 'static;
}
