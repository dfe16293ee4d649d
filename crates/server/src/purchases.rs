//! Supplier and restocking routes.
//!
//! Endpoints:
//! - `GET  /api/suppliers`               — list suppliers
//! - `POST /api/suppliers`               — register a supplier
//! - `GET  /api/suppliers/{id}`          — fetch a supplier
//! - `PUT  /api/suppliers/{id}`          — update a supplier
//! - `POST /api/purchases`               — place a restocking order
//! - `GET  /api/purchases`               — list purchases
//! - `GET  /api/purchases/{id}`          — fetch a purchase
//! - `POST /api/purchases/{id}/receive`  — record arrived units
//!
//! Receiving stock is the one place purchasing touches inventory: the
//! arrived units land on the product's stock counter with an inbound
//! movement that references the purchase number.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use pozinox_core::domain::inventory::{apply_movement, MovementKind};
use pozinox_core::{
    ProductId, Purchase, PurchaseId, PurchaseLine, PurchaseStatus, Supplier, SupplierId,
};
use pozinox_db::repositories::{
    ProductRepository, PurchaseRepository, SqlProductRepository, SqlPurchaseRepository,
    SqlSupplierRepository, SupplierRepository,
};

use crate::bootstrap::AppState;
use crate::catalog::ListQuery;
use crate::errors::ApiFailure;

#[derive(Debug, Deserialize)]
pub struct SupplierPayload {
    pub name: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub tax_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub commune: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub lead_time_days: u32,
    #[serde(default)]
    pub payment_terms: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct SupplierUpdate {
    pub name: Option<String>,
    pub company_name: Option<String>,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub commune: Option<String>,
    pub city: Option<String>,
    pub contact_name: Option<String>,
    pub lead_time_days: Option<u32>,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseLineRequest {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct PlacePurchaseRequest {
    pub supplier_id: Uuid,
    pub expected_date: NaiveDate,
    pub created_by: Uuid,
    pub lines: Vec<PurchaseLineRequest>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveRequest {
    pub product_id: Uuid,
    pub quantity: u32,
    pub recorded_by: Uuid,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/suppliers", get(list_suppliers).post(create_supplier))
        .route("/api/suppliers/{id}", get(get_supplier).put(update_supplier))
        .route("/api/purchases", get(list_purchases).post(place_purchase))
        .route("/api/purchases/{id}", get(get_purchase))
        .route("/api/purchases/{id}/receive", post(receive_stock))
}

// ---------------------------------------------------------------------------
// Supplier handlers
// ---------------------------------------------------------------------------

pub async fn list_suppliers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Supplier>>, ApiFailure> {
    let repo = SqlSupplierRepository::new(state.db_pool.clone());
    Ok(Json(repo.list(query.include_inactive).await?))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    Json(payload): Json<SupplierPayload>,
) -> Result<(StatusCode, Json<Supplier>), ApiFailure> {
    if payload.name.trim().is_empty() {
        return Err(ApiFailure::bad_request("supplier name must not be empty"));
    }

    let supplier = Supplier {
        id: SupplierId(Uuid::new_v4()),
        name: payload.name.trim().to_string(),
        company_name: payload.company_name,
        tax_id: payload.tax_id,
        email: payload.email,
        phone: payload.phone,
        address: payload.address,
        commune: payload.commune,
        city: payload.city,
        contact_name: payload.contact_name,
        lead_time_days: payload.lead_time_days,
        payment_terms: payload.payment_terms,
        active: true,
        registered_at: Utc::now(),
        notes: payload.notes,
    };

    let repo = SqlSupplierRepository::new(state.db_pool.clone());
    repo.save(supplier.clone()).await?;

    info!(event_name = "purchasing.supplier_registered", supplier_id = %supplier.id);
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Supplier>, ApiFailure> {
    let repo = SqlSupplierRepository::new(state.db_pool.clone());
    let supplier = repo
        .find_by_id(&SupplierId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("supplier"))?;
    Ok(Json(supplier))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SupplierUpdate>,
) -> Result<Json<Supplier>, ApiFailure> {
    let repo = SqlSupplierRepository::new(state.db_pool.clone());
    let mut supplier = repo
        .find_by_id(&SupplierId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("supplier"))?;

    if let Some(name) = payload.name {
        if name.trim().is_empty() {
            return Err(ApiFailure::bad_request("supplier name must not be empty"));
        }
        supplier.name = name.trim().to_string();
    }
    if let Some(value) = payload.company_name {
        supplier.company_name = value;
    }
    if let Some(value) = payload.tax_id {
        supplier.tax_id = value;
    }
    if let Some(value) = payload.email {
        supplier.email = value;
    }
    if let Some(value) = payload.phone {
        supplier.phone = value;
    }
    if let Some(value) = payload.address {
        supplier.address = value;
    }
    if let Some(value) = payload.commune {
        supplier.commune = value;
    }
    if let Some(value) = payload.city {
        supplier.city = value;
    }
    if let Some(value) = payload.contact_name {
        supplier.contact_name = value;
    }
    if let Some(value) = payload.lead_time_days {
        supplier.lead_time_days = value;
    }
    if let Some(value) = payload.payment_terms {
        supplier.payment_terms = value;
    }
    if let Some(value) = payload.notes {
        supplier.notes = value;
    }
    if let Some(active) = payload.active {
        supplier.active = active;
    }

    repo.save(supplier.clone()).await?;
    Ok(Json(supplier))
}

// ---------------------------------------------------------------------------
// Purchase handlers
// ---------------------------------------------------------------------------

pub async fn place_purchase(
    State(state): State<AppState>,
    Json(payload): Json<PlacePurchaseRequest>,
) -> Result<(StatusCode, Json<Purchase>), ApiFailure> {
    if payload.lines.is_empty() {
        return Err(ApiFailure::bad_request("purchase must have at least one line"));
    }

    let suppliers = SqlSupplierRepository::new(state.db_pool.clone());
    let supplier_id = SupplierId(payload.supplier_id);
    if suppliers.find_by_id(&supplier_id).await?.is_none() {
        return Err(ApiFailure::not_found("supplier"));
    }

    let products = SqlProductRepository::new(state.db_pool.clone());
    let mut lines = Vec::with_capacity(payload.lines.len());
    for line in &payload.lines {
        if line.quantity == 0 {
            return Err(ApiFailure::bad_request("line quantity must be greater than zero"));
        }
        let product_id = ProductId(line.product_id);
        if products.find_by_id(&product_id).await?.is_none() {
            return Err(ApiFailure::bad_request(format!(
                "unknown product `{}`",
                line.product_id
            )));
        }
        lines.push(PurchaseLine::new(product_id, line.quantity, line.unit_price));
    }

    let mut purchase = Purchase {
        id: PurchaseId(Uuid::new_v4()),
        number: String::new(),
        supplier_id,
        status: PurchaseStatus::Ordered,
        expected_date: payload.expected_date,
        received_date: None,
        lines,
        subtotal: Decimal::ZERO,
        tax: Decimal::ZERO,
        total: Decimal::ZERO,
        created_by: payload.created_by,
        notes: payload.notes,
        created_at: Utc::now(),
    };
    purchase.recompute_totals();

    let repo = SqlPurchaseRepository::new(state.db_pool.clone());
    let purchase = repo.create(purchase).await?;

    info!(
        event_name = "purchasing.purchase_placed",
        purchase_id = %purchase.id,
        number = %purchase.number,
        total = %purchase.total,
    );
    Ok((StatusCode::CREATED, Json(purchase)))
}

pub async fn list_purchases(
    State(state): State<AppState>,
) -> Result<Json<Vec<Purchase>>, ApiFailure> {
    let repo = SqlPurchaseRepository::new(state.db_pool.clone());
    Ok(Json(repo.list().await?))
}

pub async fn get_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Purchase>, ApiFailure> {
    let repo = SqlPurchaseRepository::new(state.db_pool.clone());
    let purchase = repo
        .find_by_id(&PurchaseId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("purchase"))?;
    Ok(Json(purchase))
}

pub async fn receive_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReceiveRequest>,
) -> Result<Json<Purchase>, ApiFailure> {
    let repo = SqlPurchaseRepository::new(state.db_pool.clone());
    let mut purchase = repo
        .find_by_id(&PurchaseId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("purchase"))?;

    let product_id = ProductId(payload.product_id);
    let today = Utc::now().date_naive();
    purchase.receive(&product_id, payload.quantity, today)?;

    let products = SqlProductRepository::new(state.db_pool.clone());
    let mut product = products
        .find_by_id(&product_id)
        .await?
        .ok_or_else(|| ApiFailure::not_found("product"))?;

    let mut movement = apply_movement(
        &mut product,
        MovementKind::Inbound,
        "purchase",
        payload.quantity,
        payload.recorded_by,
        Utc::now(),
    )?;
    movement.document_number = Some(purchase.number.clone());
    movement.supplier_id = Some(purchase.supplier_id.clone());

    // Purchase, stock counter, and audit row land in one transaction.
    repo.record_receipt(&purchase, &product, &movement).await?;

    info!(
        event_name = "purchasing.stock_received",
        purchase_id = %purchase.id,
        product_id = %product_id,
        quantity = payload.quantity,
        status = purchase.status.as_str(),
    );
    Ok(Json(purchase))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::Json;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use pozinox_core::PurchaseStatus;

    use crate::catalog::get_product;
    use crate::inventory::{list_movements, MovementHistoryQuery};
    use crate::testing::test_state;

    use super::{
        get_purchase, place_purchase, receive_stock, PlacePurchaseRequest,
        PurchaseLineRequest, ReceiveRequest,
    };

    // Seeded by the demo catalog fixtures.
    const SUPPLIER: u128 = 0x301;
    const ROUND_BAR_12: u128 = 0x203;

    fn purchase_request(quantity: u32) -> PlacePurchaseRequest {
        PlacePurchaseRequest {
            supplier_id: Uuid::from_u128(SUPPLIER),
            expected_date: NaiveDate::from_ymd_opt(2026, 9, 15).expect("valid date"),
            created_by: Uuid::new_v4(),
            lines: vec![PurchaseLineRequest {
                product_id: Uuid::from_u128(ROUND_BAR_12),
                quantity,
                unit_price: Decimal::new(320_000, 2),
            }],
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn placing_a_purchase_numbers_it_and_totals_lines() {
        let (state, _media) = test_state().await;

        let (status, Json(purchase)) =
            place_purchase(State(state.clone()), Json(purchase_request(10)))
                .await
                .expect("place");
        assert_eq!(status, StatusCode::CREATED);
        assert!(purchase.number.starts_with("ORD"));
        assert_eq!(purchase.status, PurchaseStatus::Ordered);
        assert_eq!(purchase.subtotal, Decimal::new(3_200_000, 2));
        assert_eq!(purchase.total, purchase.subtotal + purchase.tax);

        let Json(stored) =
            get_purchase(State(state), Path(purchase.id.0)).await.expect("fetch");
        assert_eq!(stored, purchase);
    }

    #[tokio::test]
    async fn unknown_supplier_is_not_found() {
        let (state, _media) = test_state().await;

        let mut request = purchase_request(5);
        request.supplier_id = Uuid::from_u128(0xbeef);
        let failure = place_purchase(State(state), Json(request)).await.expect_err("supplier");
        assert_eq!(failure.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn receiving_adds_stock_and_records_the_movement() {
        let (state, _media) = test_state().await;

        let (_, Json(purchase)) =
            place_purchase(State(state.clone()), Json(purchase_request(10)))
                .await
                .expect("place");

        let Json(partial) = receive_stock(
            State(state.clone()),
            Path(purchase.id.0),
            Json(ReceiveRequest {
                product_id: Uuid::from_u128(ROUND_BAR_12),
                quantity: 4,
                recorded_by: Uuid::new_v4(),
            }),
        )
        .await
        .expect("partial receive");
        assert_eq!(partial.status, PurchaseStatus::PartiallyReceived);

        let Json(complete) = receive_stock(
            State(state.clone()),
            Path(purchase.id.0),
            Json(ReceiveRequest {
                product_id: Uuid::from_u128(ROUND_BAR_12),
                quantity: 6,
                recorded_by: Uuid::new_v4(),
            }),
        )
        .await
        .expect("final receive");
        assert_eq!(complete.status, PurchaseStatus::Received);
        assert!(complete.received_date.is_some());

        // Seed stock for the round bar is 4; receiving 10 lands at 14.
        let Json(product) =
            get_product(State(state.clone()), Path(Uuid::from_u128(ROUND_BAR_12)))
                .await
                .expect("product");
        assert_eq!(product.product.stock, 14);

        let Json(history) = list_movements(
            State(state),
            Query(MovementHistoryQuery { product_id: Uuid::from_u128(ROUND_BAR_12) }),
        )
        .await
        .expect("history");
        assert_eq!(history.len(), 2);
        assert!(history
            .iter()
            .all(|movement| movement.document_number.as_deref() == Some(purchase.number.as_str())));
    }

    #[tokio::test]
    async fn over_receiving_is_rejected() {
        let (state, _media) = test_state().await;

        let (_, Json(purchase)) =
            place_purchase(State(state.clone()), Json(purchase_request(5)))
                .await
                .expect("place");

        let failure = receive_stock(
            State(state),
            Path(purchase.id.0),
            Json(ReceiveRequest {
                product_id: Uuid::from_u128(ROUND_BAR_12),
                quantity: 6,
                recorded_by: Uuid::new_v4(),
            }),
        )
        .await
        .expect_err("over receive");
        assert_eq!(failure.status, StatusCode::BAD_REQUEST);
    }
}
