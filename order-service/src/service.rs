//! Order lifecycle: placing orders against stock and moving them through
//! `placed -> paid -> shipped -> delivered`, or to `cancelled`.
//!
//! Every public operation is one unit of work. Stock changes and the order
//! row change commit together or not at all.

use chrono::Utc;
use inventory_service::{InventoryService, StockLevel, StockRequest};
use shared::{
    CommerceError, CommerceResult, CreateOrder, Order, OrderId, OrderStatus, ProductId, TenantId, TransitionPlan,
    UnitOfWork,
};
use tracing::{debug, info};

#[derive(Clone)]
pub struct OrderService<U> {
    uow: U,
    inventory: InventoryService,
}

impl<U: UnitOfWork> OrderService<U> {
    pub fn new(uow: U) -> Self {
        Self {
            uow,
            inventory: InventoryService::new(),
        }
    }

    pub async fn create_order(&self, tenant_id: TenantId, request: CreateOrder) -> CommerceResult<Order> {
        request.validate()?;

        let inventory = self.inventory;
        let order = self
            .uow
            .transaction(move |tx| {
                Box::pin(async move {
                    if !tx.client_exists(tenant_id, request.client_id).await? {
                        return Err(CommerceError::not_found("client"));
                    }

                    let product = inventory
                        .reserve(
                            tx,
                            StockRequest {
                                tenant_id,
                                product_id: request.product_id,
                                quantity: request.quantity,
                            },
                        )
                        .await?;

                    let order = Order::place(tenant_id, &request, &product, Utc::now());
                    tx.insert_order(&order).await?;
                    Ok(order)
                })
            })
            .await?;

        info!(
            "Order {} placed for tenant {}: {} x product {}",
            order.id, tenant_id, order.quantity, order.product_id
        );
        Ok(order)
    }

    /// Status is read under the order's row lock and written back with a
    /// compare-and-set, so of several concurrent cancellations exactly one restocks.
    pub async fn update_order_status(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        next: OrderStatus,
    ) -> CommerceResult<Order> {
        let inventory = self.inventory;
        let (order, plan) = self
            .uow
            .transaction(move |tx| {
                Box::pin(async move {
                    let mut order = tx
                        .lock_order(tenant_id, order_id)
                        .await?
                        .ok_or(CommerceError::not_found("order"))?;

                    let plan = order.status.plan_transition(next)?;
                    match plan {
                        TransitionPlan::AlreadyCancelled => return Ok((order, plan)),
                        TransitionPlan::ReleaseStock => {
                            inventory
                                .release(
                                    tx,
                                    StockRequest {
                                        tenant_id,
                                        product_id: order.product_id,
                                        quantity: order.quantity,
                                    },
                                )
                                .await?;
                        }
                        TransitionPlan::Advance => {}
                    }

                    let now = Utc::now();
                    if !tx
                        .compare_and_set_status(tenant_id, order_id, order.status, next, now)
                        .await?
                    {
                        return Err(CommerceError::persistence(format!(
                            "order {order_id} changed status concurrently"
                        )));
                    }

                    order.status = next;
                    order.updated_at = now;
                    Ok((order, plan))
                })
            })
            .await?;

        match plan {
            TransitionPlan::AlreadyCancelled => debug!("Order {} already cancelled, nothing to release", order_id),
            TransitionPlan::ReleaseStock => info!("Order {} cancelled", order_id),
            TransitionPlan::Advance => info!("Order {} moved to {}", order_id, next),
        }
        Ok(order)
    }

    pub async fn cancel_order(&self, tenant_id: TenantId, order_id: OrderId) -> CommerceResult<Order> {
        self.update_order_status(tenant_id, order_id, OrderStatus::Cancelled)
            .await
    }

    pub async fn get_order(&self, tenant_id: TenantId, order_id: OrderId) -> CommerceResult<Order> {
        self.uow
            .transaction(move |tx| {
                Box::pin(async move {
                    tx.find_order(tenant_id, order_id)
                        .await?
                        .ok_or(CommerceError::not_found("order"))
                })
            })
            .await
    }

    pub async fn list_orders(&self, tenant_id: TenantId) -> CommerceResult<Vec<Order>> {
        self.uow
            .transaction(move |tx| Box::pin(async move { tx.list_orders(tenant_id).await }))
            .await
    }

    pub async fn stock_level(&self, tenant_id: TenantId, product_id: ProductId) -> CommerceResult<StockLevel> {
        let inventory = self.inventory;
        self.uow
            .transaction(move |tx| Box::pin(async move { inventory.stock_level(tx, tenant_id, product_id).await }))
            .await
    }
}
