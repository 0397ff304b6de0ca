//! Postgres store on diesel-async.
//!
//! Row locks (`SELECT ... FOR UPDATE`) give every unit of work an exclusive
//! view of the products and orders it touches, so concurrent reservations on
//! one product and concurrent transitions on one order queue up behind each
//! other instead of racing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncConnection, AsyncPgConnection, RunQueryDsl};

use crate::models::{OrderRow, ProductRow};
use crate::schema::{clients, orders, products};
use crate::store::{Transaction, TxFuture, UnitOfWork};
use crate::{ClientId, CommerceError, CommerceResult, Order, OrderId, OrderStatus, Product, ProductId, TenantId};

pub type DbPool = Pool<AsyncPgConnection>;

#[derive(Clone)]
pub struct PgUnitOfWork {
    pool: DbPool,
}

impl PgUnitOfWork {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn transaction<T, F>(&self, work: F) -> CommerceResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut dyn Transaction) -> TxFuture<'t, T> + Send + 'static,
    {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        conn.transaction::<T, CommerceError, _>(|conn| {
            Box::pin(async move {
                let tx: &mut dyn Transaction = conn;
                work(tx).await
            })
        })
        .await
    }
}

#[async_trait]
impl Transaction for AsyncPgConnection {
    async fn lock_product(&mut self, tenant_id: TenantId, product_id: ProductId) -> CommerceResult<Option<Product>> {
        let row = products::table
            .filter(products::id.eq(product_id.into_uuid()))
            .filter(products::tenant_id.eq(tenant_id.into_uuid()))
            .for_update()
            .first::<ProductRow>(self)
            .await
            .optional()?;

        Ok(row.map(Product::from))
    }

    async fn find_product(&mut self, tenant_id: TenantId, product_id: ProductId) -> CommerceResult<Option<Product>> {
        let row = products::table
            .filter(products::id.eq(product_id.into_uuid()))
            .filter(products::tenant_id.eq(tenant_id.into_uuid()))
            .first::<ProductRow>(self)
            .await
            .optional()?;

        Ok(row.map(Product::from))
    }

    async fn write_product_quantity(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i32,
        at: DateTime<Utc>,
    ) -> CommerceResult<()> {
        let updated = diesel::update(
            products::table
                .filter(products::id.eq(product_id.into_uuid()))
                .filter(products::tenant_id.eq(tenant_id.into_uuid())),
        )
        .set((products::quantity.eq(quantity), products::updated_at.eq(at)))
        .execute(self)
        .await?;

        if updated == 0 {
            return Err(CommerceError::not_found("product"));
        }
        Ok(())
    }

    async fn client_exists(&mut self, tenant_id: TenantId, client_id: ClientId) -> CommerceResult<bool> {
        let found = diesel::select(exists(
            clients::table
                .filter(clients::id.eq(client_id.into_uuid()))
                .filter(clients::tenant_id.eq(tenant_id.into_uuid())),
        ))
        .get_result::<bool>(self)
        .await?;

        Ok(found)
    }

    async fn insert_order(&mut self, order: &Order) -> CommerceResult<()> {
        let row = OrderRow::from(order);

        diesel::insert_into(orders::table)
            .values(&row)
            .execute(self)
            .await?;

        Ok(())
    }

    async fn lock_order(&mut self, tenant_id: TenantId, order_id: OrderId) -> CommerceResult<Option<Order>> {
        let row = orders::table
            .filter(orders::id.eq(order_id.into_uuid()))
            .filter(orders::tenant_id.eq(tenant_id.into_uuid()))
            .for_update()
            .first::<OrderRow>(self)
            .await
            .optional()?;

        row.map(Order::try_from).transpose()
    }

    async fn find_order(&mut self, tenant_id: TenantId, order_id: OrderId) -> CommerceResult<Option<Order>> {
        let row = orders::table
            .filter(orders::id.eq(order_id.into_uuid()))
            .filter(orders::tenant_id.eq(tenant_id.into_uuid()))
            .first::<OrderRow>(self)
            .await
            .optional()?;

        row.map(Order::try_from).transpose()
    }

    async fn list_orders(&mut self, tenant_id: TenantId) -> CommerceResult<Vec<Order>> {
        let rows = orders::table
            .filter(orders::tenant_id.eq(tenant_id.into_uuid()))
            .order((orders::created_at.asc(), orders::id.asc()))
            .load::<OrderRow>(self)
            .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn compare_and_set_status(
        &mut self,
        tenant_id: TenantId,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> CommerceResult<bool> {
        let updated = diesel::update(
            orders::table
                .filter(orders::id.eq(order_id.into_uuid()))
                .filter(orders::tenant_id.eq(tenant_id.into_uuid()))
                .filter(orders::status.eq(expected.as_str())),
        )
        .set((orders::status.eq(next.as_str()), orders::updated_at.eq(at)))
        .execute(self)
        .await?;

        Ok(updated == 1)
    }
}
