use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use num_traits::Signed;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod schema;
pub mod store;

pub use error::{CommerceError, CommerceResult};
pub use memory::InMemoryStore;
pub use postgres::{DbPool, PgUnitOfWork};
pub use store::{Transaction, TxFuture, UnitOfWork};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = CommerceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s)
                    .map(Self)
                    .map_err(|e| CommerceError::validation(format!("{}: {}", stringify!($name), e)))
            }
        }
    };
}

uuid_id!(TenantId);
uuid_id!(UserId);
uuid_id!(ClientId);
uuid_id!(ProductId);
uuid_id!(OrderId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

/// What a legal status change has to do besides writing the new status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPlan {
    Advance,
    ReleaseStock,
    AlreadyCancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Placed,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// A repeated cancellation is a no-op, never a second restock.
    pub fn plan_transition(self, to: OrderStatus) -> CommerceResult<TransitionPlan> {
        use OrderStatus::*;

        match (self, to) {
            (Cancelled, Cancelled) => Ok(TransitionPlan::AlreadyCancelled),
            (Placed | Paid | Shipped, Cancelled) => Ok(TransitionPlan::ReleaseStock),
            (Placed, Paid) | (Paid, Shipped) | (Shipped, Delivered) => Ok(TransitionPlan::Advance),
            (from, to) => Err(CommerceError::InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(OrderStatus::Placed),
            "paid" => Ok(OrderStatus::Paid),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(CommerceError::validation(format!("unknown order status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            other => Err(CommerceError::validation(format!("unknown payment method '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub cost_price: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        quantity: i32,
        unit_price: BigDecimal,
        cost_price: BigDecimal,
    ) -> CommerceResult<Self> {
        if quantity < 0 {
            return Err(CommerceError::validation("product quantity cannot be negative"));
        }
        if unit_price.is_negative() || cost_price.is_negative() {
            return Err(CommerceError::validation("product prices cannot be negative"));
        }

        let now = Utc::now();
        Ok(Self {
            id: ProductId::new(),
            tenant_id,
            name: name.into(),
            quantity,
            unit_price,
            cost_price,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub tenant_id: TenantId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(tenant_id: TenantId, name: impl Into<String>) -> Self {
        Self {
            id: ClientId::new(),
            tenant_id,
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub product_id: ProductId,
    pub quantity: i32,
    /// Product price at the time the order was placed.
    pub unit_price: BigDecimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn place(tenant_id: TenantId, request: &CreateOrder, product: &Product, at: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::new(),
            tenant_id,
            client_id: request.client_id,
            product_id: product.id,
            quantity: request.quantity,
            unit_price: product.unit_price.clone(),
            status: OrderStatus::Placed,
            payment_method: request.payment_method,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn total_amount(&self) -> BigDecimal {
        self.unit_price.clone() * BigDecimal::from(self.quantity)
    }

    pub fn holds_stock(&self) -> bool {
        self.status != OrderStatus::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub client_id: ClientId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub payment_method: PaymentMethod,
}

impl CreateOrder {
    pub fn validate(&self) -> CommerceResult<()> {
        if self.quantity <= 0 {
            return Err(CommerceError::validation("order quantity must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_path_is_legal_one_step_at_a_time() {
        assert_eq!(OrderStatus::Placed.plan_transition(OrderStatus::Paid).unwrap(), TransitionPlan::Advance);
        assert_eq!(OrderStatus::Paid.plan_transition(OrderStatus::Shipped).unwrap(), TransitionPlan::Advance);
        assert_eq!(OrderStatus::Shipped.plan_transition(OrderStatus::Delivered).unwrap(), TransitionPlan::Advance);

        assert!(matches!(
            OrderStatus::Placed.plan_transition(OrderStatus::Shipped),
            Err(CommerceError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn cancelling_an_active_order_releases_stock() {
        for from in [OrderStatus::Placed, OrderStatus::Paid, OrderStatus::Shipped] {
            assert_eq!(from.plan_transition(OrderStatus::Cancelled).unwrap(), TransitionPlan::ReleaseStock);
        }
    }

    #[test]
    fn repeated_cancel_is_a_no_op() {
        assert_eq!(
            OrderStatus::Cancelled.plan_transition(OrderStatus::Cancelled).unwrap(),
            TransitionPlan::AlreadyCancelled
        );
    }

    #[test]
    fn terminal_states_cannot_be_left() {
        for to in OrderStatus::ALL {
            if to != OrderStatus::Cancelled {
                let err = OrderStatus::Cancelled.plan_transition(to).unwrap_err();
                assert!(matches!(err, CommerceError::InvalidTransition { from: OrderStatus::Cancelled, .. }));
            }
            let err = OrderStatus::Delivered.plan_transition(to).unwrap_err();
            assert!(matches!(err, CommerceError::InvalidTransition { from: OrderStatus::Delivered, .. }));
        }
    }

    #[test]
    fn same_state_moves_are_rejected() {
        for status in [OrderStatus::Placed, OrderStatus::Paid, OrderStatus::Shipped] {
            assert!(status.plan_transition(status).is_err());
        }
    }

    #[test]
    fn status_strings_match_the_stored_column() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
        assert_eq!("bank_transfer".parse::<PaymentMethod>().unwrap(), PaymentMethod::BankTransfer);
    }

    #[test]
    fn create_order_rejects_non_positive_quantity() {
        let request = CreateOrder {
            client_id: ClientId::new(),
            product_id: ProductId::new(),
            quantity: 0,
            payment_method: PaymentMethod::Cash,
        };
        assert!(matches!(request.validate(), Err(CommerceError::Validation(_))));
    }

    #[test]
    fn order_total_uses_the_price_snapshot() {
        let tenant_id = TenantId::new();
        let mut product = Product::new(tenant_id, "Widget", 10, BigDecimal::from(25), BigDecimal::from(10)).unwrap();
        let request = CreateOrder {
            client_id: ClientId::new(),
            product_id: product.id,
            quantity: 3,
            payment_method: PaymentMethod::Card,
        };
        let order = Order::place(tenant_id, &request, &product, Utc::now());

        product.unit_price = BigDecimal::from(99);
        assert_eq!(order.total_amount(), BigDecimal::from(75));
    }

    #[test]
    fn ids_parse_from_strings() {
        let id = TenantId::new();
        assert_eq!(id.to_string().parse::<TenantId>().unwrap(), id);
        assert!("not-a-uuid".parse::<TenantId>().is_err());
    }
}
