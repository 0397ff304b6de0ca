//! Authoritative available-quantity counter per (tenant, product).
//!
//! The ledger never commits on its own: both operations write through the
//! caller's [`Transaction`] and become durable only when that unit of work
//! commits.

use chrono::Utc;
use shared::{CommerceError, CommerceResult, Product, ProductId, TenantId, Transaction};

#[derive(Debug, Clone, Copy, Default)]
pub struct StockLedger;

impl StockLedger {
    /// Take `quantity` units out of the product's available stock.
    ///
    /// The product row stays locked until the enclosing unit of work ends, so
    /// two reservations against the same product see each other's writes.
    pub async fn reserve(
        &self,
        tx: &mut dyn Transaction,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i32,
    ) -> CommerceResult<Product> {
        ensure_positive(quantity)?;

        let mut product = tx
            .lock_product(tenant_id, product_id)
            .await?
            .ok_or(CommerceError::not_found("product"))?;

        if product.quantity < quantity {
            return Err(CommerceError::InsufficientStock {
                requested: quantity,
                available: product.quantity,
            });
        }

        let now = Utc::now();
        product.quantity -= quantity;
        product.updated_at = now;
        tx.write_product_quantity(tenant_id, product_id, product.quantity, now)
            .await?;

        Ok(product)
    }

    /// Put `quantity` units back. Stock level never makes this fail.
    pub async fn release(
        &self,
        tx: &mut dyn Transaction,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i32,
    ) -> CommerceResult<Product> {
        ensure_positive(quantity)?;

        let mut product = tx
            .lock_product(tenant_id, product_id)
            .await?
            .ok_or(CommerceError::not_found("product"))?;

        // Same outcome as the integer column overflowing on Postgres.
        product.quantity = product.quantity.checked_add(quantity).ok_or_else(|| {
            CommerceError::persistence(format!("stock counter overflow for product {product_id}"))
        })?;

        let now = Utc::now();
        product.updated_at = now;
        tx.write_product_quantity(tenant_id, product_id, product.quantity, now)
            .await?;

        Ok(product)
    }
}

fn ensure_positive(quantity: i32) -> CommerceResult<()> {
    if quantity <= 0 {
        return Err(CommerceError::validation("stock quantity must be positive"));
    }
    Ok(())
}
