//! Row types for the Postgres store and their conversions to domain types.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{CommerceError, Order, Product};

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = crate::schema::products)]
pub struct ProductRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub cost_price: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct OrderRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub client_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub status: String,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            name: row.name,
            quantity: row.quantity,
            unit_price: row.unit_price,
            cost_price: row.cost_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.into(),
            tenant_id: order.tenant_id.into(),
            client_id: order.client_id.into(),
            product_id: order.product_id.into(),
            quantity: order.quantity,
            unit_price: order.unit_price.clone(),
            status: order.status.as_str().to_string(),
            payment_method: order.payment_method.as_str().to_string(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = CommerceError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        // A value we cannot parse means the column was written by something
        // other than this crate; treat it as a storage fault.
        let status = row
            .status
            .parse()
            .map_err(|e| CommerceError::persistence(format!("order {}: {e}", row.id)))?;
        let payment_method = row
            .payment_method
            .parse()
            .map_err(|e| CommerceError::persistence(format!("order {}: {e}", row.id)))?;

        Ok(Self {
            id: row.id.into(),
            tenant_id: row.tenant_id.into(),
            client_id: row.client_id.into(),
            product_id: row.product_id.into(),
            quantity: row.quantity,
            unit_price: row.unit_price,
            status,
            payment_method,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
