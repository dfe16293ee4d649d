//! Customer registry routes.
//!
//! Endpoints:
//! - `GET  /api/customers`              — list customers
//! - `POST /api/customers`              — register a customer
//! - `GET  /api/customers/{id}`         — fetch a customer
//! - `PUT  /api/customers/{id}`         — update a customer
//! - `GET  /api/customers/{id}/orders`  — sales orders placed by a customer

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use pozinox_core::{Customer, CustomerId, CustomerKind, Order};
use pozinox_db::repositories::{
    CustomerRepository, OrderRepository, SqlCustomerRepository, SqlOrderRepository,
};

use crate::bootstrap::AppState;
use crate::catalog::ListQuery;
use crate::errors::ApiFailure;

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub kind: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub company_name: String,
    pub tax_id: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub alternate_phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub commune: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    pub kind: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub alternate_phone: Option<String>,
    pub address: Option<String>,
    pub commune: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub active: Option<bool>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/customers", get(list_customers).post(create_customer))
        .route("/api/customers/{id}", get(get_customer).put(update_customer))
        .route("/api/customers/{id}/orders", get(list_customer_orders))
}

pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Customer>>, ApiFailure> {
    let repo = SqlCustomerRepository::new(state.db_pool.clone());
    Ok(Json(repo.list(query.include_inactive).await?))
}

pub async fn create_customer(
    State(state): State<AppState>,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), ApiFailure> {
    let kind = CustomerKind::parse(&payload.kind).ok_or_else(|| {
        ApiFailure::bad_request(format!("unknown customer kind `{}`", payload.kind))
    })?;
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiFailure::bad_request("email must not be empty"));
    }

    let repo = SqlCustomerRepository::new(state.db_pool.clone());
    if repo.find_by_email(&email).await?.is_some() {
        return Err(ApiFailure::new(
            StatusCode::CONFLICT,
            format!("email `{email}` is already registered"),
        ));
    }

    let customer = Customer {
        id: CustomerId(Uuid::new_v4()),
        kind,
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        company_name: payload.company_name,
        tax_id: payload.tax_id,
        email,
        phone: payload.phone,
        alternate_phone: payload.alternate_phone,
        address: payload.address,
        commune: payload.commune,
        city: payload.city,
        postal_code: payload.postal_code,
        active: true,
        registered_at: Utc::now(),
    };
    repo.save(customer.clone()).await?;

    info!(event_name = "customers.registered", customer_id = %customer.id);
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, ApiFailure> {
    let repo = SqlCustomerRepository::new(state.db_pool.clone());
    let customer = repo
        .find_by_id(&CustomerId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("customer"))?;
    Ok(Json(customer))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> Result<Json<Customer>, ApiFailure> {
    let repo = SqlCustomerRepository::new(state.db_pool.clone());
    let mut customer = repo
        .find_by_id(&CustomerId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("customer"))?;

    if let Some(raw) = payload.kind {
        customer.kind = CustomerKind::parse(&raw)
            .ok_or_else(|| ApiFailure::bad_request(format!("unknown customer kind `{raw}`")))?;
    }
    if let Some(email) = payload.email {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(ApiFailure::bad_request("email must not be empty"));
        }
        // Changing to an email held by another customer is a conflict.
        if let Some(holder) = repo.find_by_email(&email).await? {
            if holder.id != customer.id {
                return Err(ApiFailure::new(
                    StatusCode::CONFLICT,
                    format!("email `{email}` is already registered"),
                ));
            }
        }
        customer.email = email;
    }
    if let Some(value) = payload.first_name {
        customer.first_name = value.trim().to_string();
    }
    if let Some(value) = payload.last_name {
        customer.last_name = value.trim().to_string();
    }
    if let Some(value) = payload.company_name {
        customer.company_name = value;
    }
    if let Some(value) = payload.tax_id {
        customer.tax_id = value;
    }
    if let Some(value) = payload.phone {
        customer.phone = value;
    }
    if let Some(value) = payload.alternate_phone {
        customer.alternate_phone = value;
    }
    if let Some(value) = payload.address {
        customer.address = value;
    }
    if let Some(value) = payload.commune {
        customer.commune = value;
    }
    if let Some(value) = payload.city {
        customer.city = value;
    }
    if let Some(value) = payload.postal_code {
        customer.postal_code = value;
    }
    if let Some(active) = payload.active {
        customer.active = active;
    }

    repo.save(customer.clone()).await?;
    Ok(Json(customer))
}

pub async fn list_customer_orders(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Order>>, ApiFailure> {
    let customers = SqlCustomerRepository::new(state.db_pool.clone());
    let customer_id = CustomerId(id);
    if customers.find_by_id(&customer_id).await?.is_none() {
        return Err(ApiFailure::not_found("customer"));
    }

    let orders = SqlOrderRepository::new(state.db_pool.clone());
    Ok(Json(orders.list_for_customer(&customer_id).await?))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::Json;
    use uuid::Uuid;

    use crate::testing::test_state;

    use super::{
        create_customer, get_customer, list_customer_orders, update_customer,
        CreateCustomerRequest, UpdateCustomerRequest,
    };

    fn registration(email: &str) -> CreateCustomerRequest {
        CreateCustomerRequest {
            kind: "company".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Fuentes".to_string(),
            company_name: "Constructora Fuentes Ltda".to_string(),
            tax_id: "77.555.123-4".to_string(),
            email: email.to_string(),
            phone: "+56 2 2345 6789".to_string(),
            alternate_phone: String::new(),
            address: "Camino a Melipilla 5670".to_string(),
            commune: "Maipu".to_string(),
            city: "Santiago".to_string(),
            postal_code: String::new(),
        }
    }

    #[tokio::test]
    async fn registration_normalizes_email_and_round_trips() {
        let (state, _media) = test_state().await;

        let (status, Json(created)) = create_customer(
            State(state.clone()),
            Json(registration("  Ventas@Fuentes.CL ")),
        )
        .await
        .expect("register");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.email, "ventas@fuentes.cl");
        assert_eq!(created.display_name(), "Constructora Fuentes Ltda");

        let Json(fetched) =
            get_customer(State(state), Path(created.id.0)).await.expect("fetch");
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (state, _media) = test_state().await;

        create_customer(State(state.clone()), Json(registration("compras@fuentes.cl")))
            .await
            .expect("first");
        let failure =
            create_customer(State(state), Json(registration("COMPRAS@fuentes.cl")))
                .await
                .expect_err("duplicate");
        assert_eq!(failure.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_customer_kind_is_rejected() {
        let (state, _media) = test_state().await;

        let mut request = registration("otro@fuentes.cl");
        request.kind = "government".to_string();
        let failure = create_customer(State(state), Json(request)).await.expect_err("kind");
        assert_eq!(failure.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_applies_partial_changes() {
        let (state, _media) = test_state().await;
        let (_, Json(created)) =
            create_customer(State(state.clone()), Json(registration("obras@fuentes.cl")))
                .await
                .expect("register");

        let Json(updated) = update_customer(
            State(state),
            Path(created.id.0),
            Json(UpdateCustomerRequest {
                kind: None,
                first_name: None,
                last_name: None,
                company_name: None,
                tax_id: None,
                email: None,
                phone: Some("+56 9 8765 4321".to_string()),
                alternate_phone: None,
                address: None,
                commune: None,
                city: None,
                postal_code: None,
                active: Some(false),
            }),
        )
        .await
        .expect("update");

        assert_eq!(updated.phone, "+56 9 8765 4321");
        assert!(!updated.active);
        assert_eq!(updated.email, created.email);
    }

    #[tokio::test]
    async fn order_listing_for_unknown_customer_is_not_found() {
        let (state, _media) = test_state().await;

        let failure = list_customer_orders(State(state), Path(Uuid::from_u128(0xbeef)))
            .await
            .expect_err("missing customer");
        assert_eq!(failure.status, StatusCode::NOT_FOUND);
    }
}
