//! Sales order routes.
//!
//! Endpoints:
//! - `POST /api/orders`              — place an order for a customer
//! - `GET  /api/orders`              — list orders
//! - `GET  /api/orders/{id}`         — fetch an order
//! - `PUT  /api/orders/{id}/status`  — move the order through fulfilment
//!
//! Order lines snapshot the catalog unit price at placement; per-line
//! discounts and the order-level discount are both applied before tax.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use pozinox_core::errors::DomainError;
use pozinox_core::{CustomerId, Order, OrderId, OrderLine, OrderStatus, PaymentMethod, ProductId};
use pozinox_db::repositories::{
    CustomerRepository, OrderRepository, ProductRepository, SqlCustomerRepository,
    SqlOrderRepository, SqlProductRepository,
};

use crate::bootstrap::AppState;
use crate::errors::ApiFailure;

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: u32,
    #[serde(default)]
    pub discount_percent: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_id: Uuid,
    pub payment_method: String,
    pub lines: Vec<OrderLineRequest>,
    #[serde(default)]
    pub discount: Decimal,
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub internal_notes: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list_orders).post(place_order))
        .route("/api/orders/{id}", get(get_order))
        .route("/api/orders/{id}/status", put(set_status))
}

pub async fn place_order(
    State(state): State<AppState>,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiFailure> {
    let payment_method = PaymentMethod::parse(&payload.payment_method).ok_or_else(|| {
        ApiFailure::bad_request(format!("unknown payment method `{}`", payload.payment_method))
    })?;
    if payload.lines.is_empty() {
        return Err(ApiFailure::bad_request("order must have at least one line"));
    }
    if payload.discount < Decimal::ZERO {
        return Err(ApiFailure::bad_request("discount must not be negative"));
    }

    let customers = SqlCustomerRepository::new(state.db_pool.clone());
    let customer_id = CustomerId(payload.customer_id);
    if customers.find_by_id(&customer_id).await?.is_none() {
        return Err(ApiFailure::not_found("customer"));
    }

    let products = SqlProductRepository::new(state.db_pool.clone());
    let mut lines = Vec::with_capacity(payload.lines.len());
    for line in &payload.lines {
        if line.quantity == 0 {
            return Err(ApiFailure::bad_request("line quantity must be greater than zero"));
        }
        if line.discount_percent < Decimal::ZERO || line.discount_percent > Decimal::ONE_HUNDRED {
            return Err(ApiFailure::bad_request("discount percent must be between 0 and 100"));
        }
        let product_id = ProductId(line.product_id);
        let product = products
            .find_by_id(&product_id)
            .await?
            .ok_or_else(|| DomainError::ProductNotFound { id: product_id.clone() })?;
        if !product.active {
            return Err(DomainError::InactiveProduct { id: product.id }.into());
        }
        lines.push(OrderLine::new(
            product_id,
            line.quantity,
            product.unit_price,
            line.discount_percent,
        ));
    }

    let mut order = Order {
        id: OrderId(Uuid::new_v4()),
        number: String::new(),
        customer_id,
        status: OrderStatus::Pending,
        payment_method,
        lines,
        subtotal: Decimal::ZERO,
        discount: payload.discount,
        tax: Decimal::ZERO,
        total: Decimal::ZERO,
        delivery_date: payload.delivery_date,
        notes: payload.notes,
        internal_notes: payload.internal_notes,
        created_at: Utc::now(),
    };
    order.recompute_totals();

    let repo = SqlOrderRepository::new(state.db_pool.clone());
    let order = repo.create(order).await?;

    info!(
        event_name = "orders.placed",
        order_id = %order.id,
        number = %order.number,
        total = %order.total,
    );
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, ApiFailure> {
    let repo = SqlOrderRepository::new(state.db_pool.clone());
    Ok(Json(repo.list().await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiFailure> {
    let repo = SqlOrderRepository::new(state.db_pool.clone());
    let order =
        repo.find_by_id(&OrderId(id)).await?.ok_or_else(|| ApiFailure::not_found("order"))?;
    Ok(Json(order))
}

pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<Json<Order>, ApiFailure> {
    let status = OrderStatus::parse(&payload.status).ok_or_else(|| {
        ApiFailure::bad_request(format!("unknown order status `{}`", payload.status))
    })?;

    let repo = SqlOrderRepository::new(state.db_pool.clone());
    let mut order =
        repo.find_by_id(&OrderId(id)).await?.ok_or_else(|| ApiFailure::not_found("order"))?;

    // Delivered and cancelled orders are closed.
    if matches!(order.status, OrderStatus::Delivered | OrderStatus::Cancelled) {
        return Err(ApiFailure::new(
            StatusCode::CONFLICT,
            format!("order is already {}", order.status.as_str()),
        ));
    }

    order.status = status;
    repo.save(&order).await?;

    info!(event_name = "orders.status_changed", order_id = %id, status = status.as_str());
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::Json;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use pozinox_core::OrderStatus;

    use crate::testing::test_state;

    use super::{
        get_order, place_order, set_status, OrderLineRequest, PlaceOrderRequest,
        SetStatusRequest,
    };

    // Seeded by the demo catalog fixtures.
    const CUSTOMER: u128 = 0x401;
    const SHEET_304: u128 = 0x201;
    const SQUARE_PROFILE: u128 = 0x202;

    fn order_request(lines: Vec<OrderLineRequest>) -> PlaceOrderRequest {
        PlaceOrderRequest {
            customer_id: Uuid::from_u128(CUSTOMER),
            payment_method: "transfer".to_string(),
            lines,
            discount: Decimal::ZERO,
            delivery_date: None,
            notes: String::new(),
            internal_notes: String::new(),
        }
    }

    #[tokio::test]
    async fn placing_an_order_snapshots_prices_and_numbers_it() {
        let (state, _media) = test_state().await;

        let (status, Json(order)) = place_order(
            State(state.clone()),
            Json(order_request(vec![
                OrderLineRequest {
                    product_id: Uuid::from_u128(SHEET_304),
                    quantity: 2,
                    discount_percent: Decimal::ZERO,
                },
                OrderLineRequest {
                    product_id: Uuid::from_u128(SQUARE_PROFILE),
                    quantity: 10,
                    discount_percent: Decimal::new(5, 0),
                },
            ])),
        )
        .await
        .expect("place");

        assert_eq!(status, StatusCode::CREATED);
        assert!(order.number.starts_with("POZ"));
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, order.subtotal - order.discount + order.tax);

        let Json(stored) = get_order(State(state), Path(order.id.0)).await.expect("fetch");
        assert_eq!(stored, order);
    }

    #[tokio::test]
    async fn orders_without_lines_or_with_bad_payment_method_are_rejected() {
        let (state, _media) = test_state().await;

        let failure = place_order(State(state.clone()), Json(order_request(vec![])))
            .await
            .expect_err("no lines");
        assert_eq!(failure.status, StatusCode::BAD_REQUEST);

        let mut request = order_request(vec![OrderLineRequest {
            product_id: Uuid::from_u128(SHEET_304),
            quantity: 1,
            discount_percent: Decimal::ZERO,
        }]);
        request.payment_method = "crypto".to_string();
        let failure = place_order(State(state), Json(request)).await.expect_err("method");
        assert_eq!(failure.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_customer_is_not_found() {
        let (state, _media) = test_state().await;

        let mut request = order_request(vec![OrderLineRequest {
            product_id: Uuid::from_u128(SHEET_304),
            quantity: 1,
            discount_percent: Decimal::ZERO,
        }]);
        request.customer_id = Uuid::from_u128(0xbeef);
        let failure = place_order(State(state), Json(request)).await.expect_err("customer");
        assert_eq!(failure.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_moves_forward_but_closed_orders_stay_closed() {
        let (state, _media) = test_state().await;

        let (_, Json(order)) = place_order(
            State(state.clone()),
            Json(order_request(vec![OrderLineRequest {
                product_id: Uuid::from_u128(SHEET_304),
                quantity: 1,
                discount_percent: Decimal::ZERO,
            }])),
        )
        .await
        .expect("place");

        for next in ["confirmed", "preparing", "ready", "shipped", "delivered"] {
            let Json(updated) = set_status(
                State(state.clone()),
                Path(order.id.0),
                Json(SetStatusRequest { status: next.to_string() }),
            )
            .await
            .expect("advance");
            assert_eq!(updated.status.as_str(), next);
        }

        let failure = set_status(
            State(state),
            Path(order.id.0),
            Json(SetStatusRequest { status: "pending".to_string() }),
        )
        .await
        .expect_err("delivered is closed");
        assert_eq!(failure.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_status_is_rejected() {
        let (state, _media) = test_state().await;

        let failure = set_status(
            State(state),
            Path(Uuid::new_v4()),
            Json(SetStatusRequest { status: "teleported".to_string() }),
        )
        .await
        .expect_err("status");
        assert_eq!(failure.status, StatusCode::BAD_REQUEST);
    }
}
