//! Inventory routes: stock movements and alerts.
//!
//! Endpoints:
//! - `POST /api/inventory/movements`            — record a stock movement
//! - `GET  /api/inventory/movements?product_id=` — movement history for a product
//! - `GET  /api/inventory/alerts`               — open (unacknowledged) alerts
//! - `POST /api/inventory/alerts/{id}/ack`      — acknowledge an alert
//!
//! Recording a movement updates the product's stock counter and appends
//! the audit entry; when the new level trips a threshold an alert row is
//! raised alongside.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use pozinox_core::domain::inventory::{
    apply_movement, evaluate_stock_alert, AlertKind, MovementKind, StockAlert, StockMovement,
};
use pozinox_core::{ProductId, SupplierId};
use pozinox_db::repositories::{
    InventoryRepository, ProductRepository, SqlInventoryRepository, SqlProductRepository,
};

use crate::bootstrap::AppState;
use crate::errors::ApiFailure;

#[derive(Debug, Deserialize)]
pub struct RecordMovementRequest {
    pub product_id: Uuid,
    pub kind: String,
    pub reason: String,
    pub quantity: u32,
    pub document_number: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub recorded_by: Uuid,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub struct MovementResponse {
    #[serde(flatten)]
    pub movement: StockMovement,
    /// Alert raised by this movement, if the new stock level tripped one.
    pub alert: Option<AlertKind>,
}

#[derive(Debug, Deserialize)]
pub struct MovementHistoryQuery {
    pub product_id: Uuid,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/inventory/movements", post(record_movement).get(list_movements))
        .route("/api/inventory/alerts", get(list_alerts))
        .route("/api/inventory/alerts/{id}/ack", post(acknowledge_alert))
}

pub async fn record_movement(
    State(state): State<AppState>,
    Json(payload): Json<RecordMovementRequest>,
) -> Result<(StatusCode, Json<MovementResponse>), ApiFailure> {
    let kind = MovementKind::parse(&payload.kind).ok_or_else(|| {
        ApiFailure::bad_request(format!("unknown movement kind `{}`", payload.kind))
    })?;

    let products = SqlProductRepository::new(state.db_pool.clone());
    let product_id = ProductId(payload.product_id);
    let mut product = products
        .find_by_id(&product_id)
        .await?
        .ok_or_else(|| ApiFailure::not_found("product"))?;

    let mut movement =
        apply_movement(&mut product, kind, payload.reason, payload.quantity, payload.recorded_by, Utc::now())?;
    movement.document_number = payload.document_number;
    movement.supplier_id = payload.supplier_id.map(SupplierId);
    movement.notes = payload.notes;

    let alert = evaluate_stock_alert(&product);
    let alert_row = alert.map(|alert_kind| StockAlert {
        id: Uuid::new_v4(),
        product_id: product.id.clone(),
        kind: alert_kind,
        message: format!(
            "{} stock at {} (minimum {})",
            product.sku, product.stock, product.minimum_stock
        ),
        created_at: Utc::now(),
        acknowledged: false,
    });

    // Counter update, audit row, and alert land in one transaction.
    let inventory = SqlInventoryRepository::new(state.db_pool.clone());
    inventory.apply(&product, &movement, alert_row.as_ref()).await?;

    info!(
        event_name = "inventory.movement_recorded",
        product_id = %product.id,
        kind = kind.as_str(),
        previous_stock = movement.previous_stock,
        new_stock = movement.new_stock,
    );
    if let Some(alert_kind) = alert {
        warn!(
            event_name = "inventory.alert_raised",
            product_id = %product.id,
            kind = alert_kind.as_str(),
            stock = product.stock,
        );
    }

    Ok((StatusCode::CREATED, Json(MovementResponse { movement, alert })))
}

pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementHistoryQuery>,
) -> Result<Json<Vec<StockMovement>>, ApiFailure> {
    let inventory = SqlInventoryRepository::new(state.db_pool.clone());
    Ok(Json(inventory.list_movements_for_product(&ProductId(query.product_id)).await?))
}

pub async fn list_alerts(
    State(state): State<AppState>,
) -> Result<Json<Vec<StockAlert>>, ApiFailure> {
    let inventory = SqlInventoryRepository::new(state.db_pool.clone());
    Ok(Json(inventory.list_open_alerts().await?))
}

pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    let inventory = SqlInventoryRepository::new(state.db_pool.clone());
    if !inventory.acknowledge_alert(id).await? {
        return Err(ApiFailure::not_found("alert"));
    }
    info!(event_name = "inventory.alert_acknowledged", alert_id = %id);
    Ok(StatusCode::NO_CONTENT)
}
