use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, patch, post},
    Router,
};
use inventory_service::StockLevel;
use serde::{Deserialize, Serialize};
use shared::{CommerceError, CreateOrder, Order, OrderId, OrderStatus, ProductId, TenantId, UnitOfWork, UserId};
use tracing::{error, info};

use crate::service::OrderService;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState<U> {
    pub orders: OrderService<U>,
}

/// Caller identity as resolved by the gateway in front of this service.
///
/// Authentication happens upstream; the headers are trusted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant_id: TenantId,
    pub user_id: Option<UserId>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let tenant_id = headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| bad_tenant("x-tenant-id header is required"))?
            .parse::<TenantId>()
            .map_err(|_| bad_tenant("x-tenant-id must be a UUID"))?;

        let user_id = headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<UserId>().ok());

        Ok(Self { tenant_id, user_id })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn create_router<U>(state: AppState<U>) -> Router
where
    U: UnitOfWork + Clone + 'static,
{
    Router::new()
        .route("/orders", post(create_order::<U>).get(list_orders::<U>))
        .route("/orders/:order_id", get(get_order::<U>))
        .route("/orders/:order_id/status", patch(update_order_status::<U>))
        .route("/products/:product_id/stock", get(stock_level::<U>))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn create_order<U: UnitOfWork>(
    State(state): State<AppState<U>>,
    headers: HeaderMap,
    payload: Result<Json<CreateOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let ctx = RequestContext::from_headers(&headers)?;
    let Json(request) = payload.map_err(|rejection| malformed(rejection.body_text()))?;
    info!(
        "Create order for tenant {} by {:?}: {} x product {}",
        ctx.tenant_id, ctx.user_id, request.quantity, request.product_id
    );

    let order = state
        .orders
        .create_order(ctx.tenant_id, request)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders<U: UnitOfWork>(
    State(state): State<AppState<U>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Order>>, ApiError> {
    let ctx = RequestContext::from_headers(&headers)?;
    let orders = state.orders.list_orders(ctx.tenant_id).await.map_err(error_response)?;
    Ok(Json(orders))
}

pub async fn get_order<U: UnitOfWork>(
    State(state): State<AppState<U>>,
    headers: HeaderMap,
    path: Result<Path<OrderId>, PathRejection>,
) -> Result<Json<Order>, ApiError> {
    let ctx = RequestContext::from_headers(&headers)?;
    let Path(order_id) = path.map_err(|rejection| malformed(rejection.body_text()))?;
    let order = state
        .orders
        .get_order(ctx.tenant_id, order_id)
        .await
        .map_err(error_response)?;
    Ok(Json(order))
}

pub async fn update_order_status<U: UnitOfWork>(
    State(state): State<AppState<U>>,
    headers: HeaderMap,
    path: Result<Path<OrderId>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let ctx = RequestContext::from_headers(&headers)?;
    let Path(order_id) = path.map_err(|rejection| malformed(rejection.body_text()))?;
    let Json(request) = payload.map_err(|rejection| malformed(rejection.body_text()))?;
    info!(
        "Status change for order {} to {} by {:?}",
        order_id, request.status, ctx.user_id
    );

    let order = state
        .orders
        .update_order_status(ctx.tenant_id, order_id, request.status)
        .await
        .map_err(error_response)?;
    Ok(Json(order))
}

pub async fn stock_level<U: UnitOfWork>(
    State(state): State<AppState<U>>,
    headers: HeaderMap,
    path: Result<Path<ProductId>, PathRejection>,
) -> Result<Json<StockLevel>, ApiError> {
    let ctx = RequestContext::from_headers(&headers)?;
    let Path(product_id) = path.map_err(|rejection| malformed(rejection.body_text()))?;
    let level = state
        .orders
        .stock_level(ctx.tenant_id, product_id)
        .await
        .map_err(error_response)?;
    Ok(Json(level))
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub fn error_response(err: CommerceError) -> ApiError {
    let (status, code) = match &err {
        CommerceError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        CommerceError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        CommerceError::InsufficientStock { .. } => (StatusCode::CONFLICT, "insufficient_stock"),
        CommerceError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
        CommerceError::Persistence(_) => {
            error!("Persistence failure: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, "persistence_failure")
        }
    };

    json_error(status, code, err.to_string())
}

// Extractor rejections are malformed input, same shape as a domain validation error.
fn malformed(message: String) -> ApiError {
    json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

fn bad_tenant(message: &str) -> ApiError {
    json_error(StatusCode::BAD_REQUEST, "missing_tenant", message)
}

fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: message.into(),
        }),
    )
}
