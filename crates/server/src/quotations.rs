//! Quotation routes: the draft/finalize/checkout flow.
//!
//! Endpoints:
//! - `POST   /api/quotations`                       — open (or reuse) the owner's draft
//! - `GET    /api/quotations?owner_id=`             — list an owner's quotations
//! - `GET    /api/quotations/{id}`                  — fetch a quotation
//! - `POST   /api/quotations/{id}/lines`            — add a product to the draft
//! - `PUT    /api/quotations/{id}/lines/{line_id}`  — change a line's quantity
//! - `DELETE /api/quotations/{id}/lines/{line_id}`  — drop a line
//! - `POST   /api/quotations/{id}/finalize`         — lock the line set
//! - `POST   /api/quotations/{id}/cancel`           — cancel before payment
//! - `POST   /api/quotations/{id}/checkout`         — create the payment preference
//! - `GET    /api/quotations/{id}/payment/success`  — gateway redirect, marks paid
//! - `GET    /api/quotations/{id}/payment/failure`  — gateway redirect, no state change
//! - `GET    /api/quotations/{id}/payment/pending`  — gateway redirect, no state change
//!
//! An owner keeps at most one draft at a time; opening a quotation
//! returns the existing draft instead of stacking a second one.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use pozinox_core::domain::quotation::{LineId, Quotation, QuotationId, QuotationStatus};
use pozinox_core::errors::DomainError;
use pozinox_core::ProductId;
use pozinox_db::repositories::{
    ProductRepository, QuotationRepository, SqlProductRepository, SqlQuotationRepository,
};

use crate::bootstrap::AppState;
use crate::errors::ApiFailure;
use crate::payments::{BackUrls, PreferenceItem, PreferenceRequest};

#[derive(Debug, Deserialize)]
pub struct OpenQuotationRequest {
    pub owner_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AddLineRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub preference_id: String,
    pub init_point: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentCallbackQuery {
    pub payment_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentCallbackResponse {
    pub number: String,
    pub status: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/quotations", post(open_quotation).get(list_quotations))
        .route("/api/quotations/{id}", get(get_quotation))
        .route("/api/quotations/{id}/lines", post(add_line))
        .route("/api/quotations/{id}/lines/{line_id}", put(set_quantity).delete(remove_line))
        .route("/api/quotations/{id}/finalize", post(finalize_quotation))
        .route("/api/quotations/{id}/cancel", post(cancel_quotation))
        .route("/api/quotations/{id}/checkout", post(checkout))
        .route("/api/quotations/{id}/payment/success", get(payment_success))
        .route("/api/quotations/{id}/payment/failure", get(payment_failure))
        .route("/api/quotations/{id}/payment/pending", get(payment_pending))
}

async fn load_quotation(
    state: &AppState,
    id: Uuid,
) -> Result<(SqlQuotationRepository, Quotation), ApiFailure> {
    let repo = SqlQuotationRepository::new(state.db_pool.clone());
    let quotation = repo
        .find_by_id(&QuotationId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("quotation"))?;
    Ok((repo, quotation))
}

pub async fn open_quotation(
    State(state): State<AppState>,
    Json(payload): Json<OpenQuotationRequest>,
) -> Result<(StatusCode, Json<Quotation>), ApiFailure> {
    let repo = SqlQuotationRepository::new(state.db_pool.clone());
    if let Some(draft) = repo.find_draft_for_owner(payload.owner_id).await? {
        return Ok((StatusCode::OK, Json(draft)));
    }

    let quotation =
        repo.create(Quotation::new(String::new(), payload.owner_id, Utc::now())).await?;
    info!(
        event_name = "quotations.opened",
        quotation_id = %quotation.id,
        number = %quotation.number,
    );
    Ok((StatusCode::CREATED, Json(quotation)))
}

pub async fn list_quotations(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<Quotation>>, ApiFailure> {
    let repo = SqlQuotationRepository::new(state.db_pool.clone());
    Ok(Json(repo.list_for_owner(query.owner_id).await?))
}

pub async fn get_quotation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Quotation>, ApiFailure> {
    let (_, quotation) = load_quotation(&state, id).await?;
    Ok(Json(quotation))
}

pub async fn add_line(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddLineRequest>,
) -> Result<Json<Quotation>, ApiFailure> {
    let (repo, mut quotation) = load_quotation(&state, id).await?;

    let products = SqlProductRepository::new(state.db_pool.clone());
    let product_id = ProductId(payload.product_id);
    let product = products
        .find_by_id(&product_id)
        .await?
        .ok_or(DomainError::ProductNotFound { id: product_id })?;

    quotation.add_or_increment(&product, payload.quantity)?;
    quotation.updated_at = Utc::now();
    repo.save(&quotation).await?;
    Ok(Json(quotation))
}

pub async fn set_quantity(
    State(state): State<AppState>,
    Path((id, line_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SetQuantityRequest>,
) -> Result<Json<Quotation>, ApiFailure> {
    let (repo, mut quotation) = load_quotation(&state, id).await?;

    quotation.set_quantity(&LineId(line_id), payload.quantity)?;
    quotation.updated_at = Utc::now();
    repo.save(&quotation).await?;
    Ok(Json(quotation))
}

pub async fn remove_line(
    State(state): State<AppState>,
    Path((id, line_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Quotation>, ApiFailure> {
    let (repo, mut quotation) = load_quotation(&state, id).await?;

    quotation.remove_line(&LineId(line_id))?;
    quotation.updated_at = Utc::now();
    repo.save(&quotation).await?;
    Ok(Json(quotation))
}

pub async fn finalize_quotation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Quotation>, ApiFailure> {
    let (repo, mut quotation) = load_quotation(&state, id).await?;

    let now = Utc::now();
    quotation.finalize(now)?;
    quotation.updated_at = now;
    repo.save(&quotation).await?;

    info!(
        event_name = "quotations.finalized",
        quotation_id = %quotation.id,
        number = %quotation.number,
        total = %quotation.total,
    );
    Ok(Json(quotation))
}

pub async fn cancel_quotation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Quotation>, ApiFailure> {
    let (repo, mut quotation) = load_quotation(&state, id).await?;

    quotation.cancel()?;
    quotation.updated_at = Utc::now();
    repo.save(&quotation).await?;

    info!(event_name = "quotations.cancelled", quotation_id = %quotation.id);
    Ok(Json(quotation))
}

pub async fn checkout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CheckoutResponse>, ApiFailure> {
    let payments = state.payments.clone().ok_or_else(|| {
        ApiFailure::new(StatusCode::SERVICE_UNAVAILABLE, "payment gateway is not configured")
    })?;

    let (repo, mut quotation) = load_quotation(&state, id).await?;
    if quotation.status != QuotationStatus::Finalized {
        return Err(DomainError::InvalidState { status: quotation.status, operation: "checkout" }
            .into());
    }

    let products = SqlProductRepository::new(state.db_pool.clone());
    let mut items = Vec::with_capacity(quotation.lines.len());
    for line in &quotation.lines {
        let title = match products.find_by_id(&line.product_id).await? {
            Some(product) => product.name,
            None => format!("Producto {}", line.product_id),
        };
        items.push(PreferenceItem {
            title,
            quantity: line.quantity,
            unit_price: line.unit_price,
            currency_id: payments.currency().to_string(),
        });
    }

    let base = state.public_base_url.trim_end_matches('/');
    let request = PreferenceRequest {
        items,
        back_urls: BackUrls {
            success: format!("{base}/api/quotations/{id}/payment/success"),
            failure: format!("{base}/api/quotations/{id}/payment/failure"),
            pending: format!("{base}/api/quotations/{id}/payment/pending"),
        },
        external_reference: quotation.number.clone(),
    };
    let preference = payments.create_preference(&request).await?;

    quotation.mercadopago_preference_id = Some(preference.id.clone());
    quotation.updated_at = Utc::now();
    repo.save(&quotation).await?;

    info!(
        event_name = "quotations.checkout_started",
        quotation_id = %quotation.id,
        preference_id = %preference.id,
    );
    Ok(Json(CheckoutResponse { preference_id: preference.id, init_point: preference.init_point }))
}

pub async fn payment_success(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PaymentCallbackQuery>,
) -> Result<Json<PaymentCallbackResponse>, ApiFailure> {
    let (repo, mut quotation) = load_quotation(&state, id).await?;

    quotation.mark_paid(query.payment_id)?;
    quotation.updated_at = Utc::now();
    repo.save(&quotation).await?;

    info!(
        event_name = "quotations.paid",
        quotation_id = %quotation.id,
        number = %quotation.number,
    );
    Ok(Json(PaymentCallbackResponse { number: quotation.number, status: "paid" }))
}

pub async fn payment_failure(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentCallbackResponse>, ApiFailure> {
    let (_, quotation) = load_quotation(&state, id).await?;
    info!(event_name = "quotations.payment_failed", quotation_id = %quotation.id);
    Ok(Json(PaymentCallbackResponse { number: quotation.number, status: "failure" }))
}

pub async fn payment_pending(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentCallbackResponse>, ApiFailure> {
    let (_, quotation) = load_quotation(&state, id).await?;
    info!(event_name = "quotations.payment_pending", quotation_id = %quotation.id);
    Ok(Json(PaymentCallbackResponse { number: quotation.number, status: "pending" }))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::Json;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use pozinox_core::domain::quotation::QuotationStatus;

    use crate::bootstrap::AppState;
    use crate::testing::test_state;

    use super::{
        add_line, cancel_quotation, checkout, finalize_quotation, open_quotation,
        payment_success, remove_line, set_quantity, AddLineRequest, OpenQuotationRequest,
        PaymentCallbackQuery, SetQuantityRequest,
    };

    // Seeded by the demo catalog fixtures.
    const SHEET_304: u128 = 0x201;
    const ROUND_BAR_12: u128 = 0x203;

    async fn open_draft(state: &AppState, owner: Uuid) -> super::Quotation {
        let (_, Json(draft)) =
            open_quotation(State(state.clone()), Json(OpenQuotationRequest { owner_id: owner }))
                .await
                .expect("open");
        draft
    }

    #[tokio::test]
    async fn opening_twice_reuses_the_same_draft() {
        let (state, _media) = test_state().await;
        let owner = Uuid::new_v4();

        let (first_status, Json(first)) =
            open_quotation(State(state.clone()), Json(OpenQuotationRequest { owner_id: owner }))
                .await
                .expect("first open");
        let (second_status, Json(second)) =
            open_quotation(State(state.clone()), Json(OpenQuotationRequest { owner_id: owner }))
                .await
                .expect("second open");

        assert_eq!(first_status, StatusCode::CREATED);
        assert_eq!(second_status, StatusCode::OK);
        assert_eq!(first.id, second.id);
        assert!(first.number.starts_with("COT"));
    }

    #[tokio::test]
    async fn line_mutations_keep_totals_consistent() {
        let (state, _media) = test_state().await;
        let draft = open_draft(&state, Uuid::new_v4()).await;

        let Json(with_line) = add_line(
            State(state.clone()),
            Path(draft.id.0),
            Json(AddLineRequest { product_id: Uuid::from_u128(SHEET_304), quantity: 2 }),
        )
        .await
        .expect("add");
        assert_eq!(with_line.lines.len(), 1);
        assert_eq!(with_line.total, with_line.subtotal + with_line.tax);

        let line_id = with_line.lines[0].id.0;
        let Json(updated) = set_quantity(
            State(state.clone()),
            Path((draft.id.0, line_id)),
            Json(SetQuantityRequest { quantity: 5 }),
        )
        .await
        .expect("set quantity");
        assert_eq!(updated.lines[0].quantity, 5);
        assert_eq!(
            updated.subtotal,
            updated.lines[0].unit_price * Decimal::from(5u32)
        );

        let Json(empty) = remove_line(State(state), Path((draft.id.0, line_id)))
            .await
            .expect("remove");
        assert!(empty.lines.is_empty());
        assert_eq!(empty.total, Decimal::ZERO);
    }

    #[tokio::test]
    async fn adding_an_unknown_product_is_not_found() {
        let (state, _media) = test_state().await;
        let draft = open_draft(&state, Uuid::new_v4()).await;

        let failure = add_line(
            State(state),
            Path(draft.id.0),
            Json(AddLineRequest { product_id: Uuid::from_u128(0xfeed), quantity: 1 }),
        )
        .await
        .expect_err("missing product");
        assert_eq!(failure.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn finalizing_an_empty_draft_is_unprocessable() {
        let (state, _media) = test_state().await;
        let draft = open_draft(&state, Uuid::new_v4()).await;

        let failure = finalize_quotation(State(state), Path(draft.id.0))
            .await
            .expect_err("empty finalize");
        assert_eq!(failure.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn finalize_then_line_mutation_conflicts() {
        let (state, _media) = test_state().await;
        let draft = open_draft(&state, Uuid::new_v4()).await;

        add_line(
            State(state.clone()),
            Path(draft.id.0),
            Json(AddLineRequest { product_id: Uuid::from_u128(ROUND_BAR_12), quantity: 3 }),
        )
        .await
        .expect("add");
        let Json(finalized) = finalize_quotation(State(state.clone()), Path(draft.id.0))
            .await
            .expect("finalize");
        assert_eq!(finalized.status, QuotationStatus::Finalized);
        assert!(finalized.finalized_at.is_some());

        let failure = add_line(
            State(state),
            Path(draft.id.0),
            Json(AddLineRequest { product_id: Uuid::from_u128(SHEET_304), quantity: 1 }),
        )
        .await
        .expect_err("add after finalize");
        assert_eq!(failure.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn finalizing_frees_the_owner_for_a_new_draft() {
        let (state, _media) = test_state().await;
        let owner = Uuid::new_v4();
        let draft = open_draft(&state, owner).await;

        add_line(
            State(state.clone()),
            Path(draft.id.0),
            Json(AddLineRequest { product_id: Uuid::from_u128(SHEET_304), quantity: 1 }),
        )
        .await
        .expect("add");
        finalize_quotation(State(state.clone()), Path(draft.id.0)).await.expect("finalize");

        let next = open_draft(&state, owner).await;
        assert_ne!(next.id, draft.id);
        assert_eq!(next.status, QuotationStatus::Draft);
    }

    #[tokio::test]
    async fn checkout_without_a_gateway_is_unavailable() {
        let (state, _media) = test_state().await;
        let draft = open_draft(&state, Uuid::new_v4()).await;

        let failure = checkout(State(state), Path(draft.id.0)).await.expect_err("no gateway");
        assert_eq!(failure.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn success_callback_marks_the_quotation_paid_idempotently() {
        let (state, _media) = test_state().await;
        let draft = open_draft(&state, Uuid::new_v4()).await;

        add_line(
            State(state.clone()),
            Path(draft.id.0),
            Json(AddLineRequest { product_id: Uuid::from_u128(SHEET_304), quantity: 1 }),
        )
        .await
        .expect("add");
        finalize_quotation(State(state.clone()), Path(draft.id.0)).await.expect("finalize");

        let Json(first) = payment_success(
            State(state.clone()),
            Path(draft.id.0),
            Query(PaymentCallbackQuery { payment_id: Some("mp-777".to_string()) }),
        )
        .await
        .expect("first callback");
        let Json(second) = payment_success(
            State(state.clone()),
            Path(draft.id.0),
            Query(PaymentCallbackQuery { payment_id: None }),
        )
        .await
        .expect("duplicate callback");

        assert_eq!(first.status, "paid");
        assert_eq!(second.status, "paid");

        let Json(stored) = super::get_quotation(State(state), Path(draft.id.0))
            .await
            .expect("fetch");
        assert_eq!(stored.status, QuotationStatus::Paid);
        assert_eq!(stored.mercadopago_payment_id.as_deref(), Some("mp-777"));
    }

    #[tokio::test]
    async fn success_callback_on_a_draft_conflicts() {
        let (state, _media) = test_state().await;
        let draft = open_draft(&state, Uuid::new_v4()).await;

        let failure = payment_success(
            State(state),
            Path(draft.id.0),
            Query(PaymentCallbackQuery { payment_id: None }),
        )
        .await
        .expect_err("draft cannot be paid");
        assert_eq!(failure.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn cancelled_quotations_reject_payment() {
        let (state, _media) = test_state().await;
        let draft = open_draft(&state, Uuid::new_v4()).await;

        cancel_quotation(State(state.clone()), Path(draft.id.0)).await.expect("cancel");
        let failure = payment_success(
            State(state),
            Path(draft.id.0),
            Query(PaymentCallbackQuery { payment_id: None }),
        )
        .await
        .expect_err("cancelled cannot be paid");
        assert_eq!(failure.status, StatusCode::CONFLICT);
    }
}
