//! Catalog routes for categories and products.
//!
//! Endpoints:
//! - `GET    /api/categories`              — list categories
//! - `POST   /api/categories`              — create a category
//! - `GET    /api/categories/{id}`         — fetch a category
//! - `PUT    /api/categories/{id}`         — update a category
//! - `DELETE /api/categories/{id}`         — deactivate a category
//! - `GET    /api/products`                — list products (filterable)
//! - `GET    /api/products/low-stock`      — products at or below minimum stock
//! - `POST   /api/products`                — create a product
//! - `GET    /api/products/{id}`           — fetch a product
//! - `PUT    /api/products/{id}`           — update a product
//! - `DELETE /api/products/{id}`           — deactivate a product
//! - `POST   /api/products/{id}/image`     — upload the product image
//! - `DELETE /api/products/{id}/image`     — remove the product image
//!
//! Deactivation is the only removal: catalog rows are referenced by
//! quotations and orders, so `DELETE` flips `active` off instead of
//! dropping the row.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use pozinox_core::{Category, CategoryId, Product, ProductId, SteelType};
use pozinox_db::repositories::{
    CategoryRepository, ProductFilter, ProductRepository, SqlCategoryRepository,
    SqlProductRepository,
};

use crate::bootstrap::AppState;
use crate::errors::ApiFailure;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CategoryPayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Page size for product listings. Chosen to keep payloads a browser
/// grid can render without windowing.
const PRODUCTS_PER_PAGE: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub q: Option<String>,
    pub category: Option<Uuid>,
    pub steel_type: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    /// 1-based page number; absent means the first page.
    pub page: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: Uuid,
    pub steel_type: String,
    pub thickness_mm: Option<Decimal>,
    pub width_mm: Option<Decimal>,
    pub length_mm: Option<Decimal>,
    pub weight_per_meter: Option<Decimal>,
    pub unit_price: Decimal,
    pub price_per_meter: Option<Decimal>,
    pub price_per_kg: Option<Decimal>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub minimum_stock: u32,
    pub unit_of_measure: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub steel_type: Option<String>,
    pub thickness_mm: Option<Decimal>,
    pub width_mm: Option<Decimal>,
    pub length_mm: Option<Decimal>,
    pub weight_per_meter: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub price_per_meter: Option<Decimal>,
    pub price_per_kg: Option<Decimal>,
    pub minimum_stock: Option<u32>,
    pub unit_of_measure: Option<String>,
    pub active: Option<bool>,
}

/// Product with its image resolved to a public URL. `image` stores the
/// backend object name; only the URL is useful to clients.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub name: String,
    pub url: String,
}

fn product_response(state: &AppState, product: Product) -> ProductResponse {
    let image_url = product.image.as_deref().map(|name| state.storage.url(name));
    ProductResponse { product, image_url }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list_categories).post(create_category))
        .route(
            "/api/categories/{id}",
            get(get_category).put(update_category).delete(deactivate_category),
        )
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/low-stock", get(list_low_stock))
        .route(
            "/api/products/{id}",
            get(get_product).put(update_product).delete(deactivate_product),
        )
        .route("/api/products/{id}/image", post(upload_image).delete(remove_image))
}

// ---------------------------------------------------------------------------
// Category handlers
// ---------------------------------------------------------------------------

pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Category>>, ApiFailure> {
    let repo = SqlCategoryRepository::new(state.db_pool.clone());
    Ok(Json(repo.list(query.include_inactive).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CategoryPayload>,
) -> Result<(StatusCode, Json<Category>), ApiFailure> {
    if payload.name.trim().is_empty() {
        return Err(ApiFailure::bad_request("category name must not be empty"));
    }

    let category = Category::new(payload.name.trim(), payload.description);
    let repo = SqlCategoryRepository::new(state.db_pool.clone());
    repo.save(category.clone()).await?;

    info!(event_name = "catalog.category.created", category_id = %category.id);
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, ApiFailure> {
    let repo = SqlCategoryRepository::new(state.db_pool.clone());
    let category = repo
        .find_by_id(&CategoryId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("category"))?;
    Ok(Json(category))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryUpdate>,
) -> Result<Json<Category>, ApiFailure> {
    let repo = SqlCategoryRepository::new(state.db_pool.clone());
    let mut category = repo
        .find_by_id(&CategoryId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("category"))?;

    if let Some(name) = payload.name {
        if name.trim().is_empty() {
            return Err(ApiFailure::bad_request("category name must not be empty"));
        }
        category.name = name.trim().to_string();
    }
    if let Some(description) = payload.description {
        category.description = description;
    }
    if let Some(active) = payload.active {
        category.active = active;
    }

    repo.save(category.clone()).await?;
    Ok(Json(category))
}

pub async fn deactivate_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    let repo = SqlCategoryRepository::new(state.db_pool.clone());
    let mut category = repo
        .find_by_id(&CategoryId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("category"))?;

    category.active = false;
    repo.save(category).await?;

    info!(event_name = "catalog.category.deactivated", category_id = %id);
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Product handlers
// ---------------------------------------------------------------------------

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiFailure> {
    let steel_type = match query.steel_type.as_deref() {
        Some(raw) => Some(SteelType::parse(raw).ok_or_else(|| {
            ApiFailure::bad_request(format!("unknown steel type `{raw}`"))
        })?),
        None => None,
    };

    let filter = ProductFilter {
        category_id: query.category.map(CategoryId),
        steel_type,
        search: query.q.filter(|term| !term.trim().is_empty()),
        include_inactive: query.include_inactive,
    };

    let page = query.page.unwrap_or(1).max(1);
    let repo = SqlProductRepository::new(state.db_pool.clone());
    let products = repo.list(&filter).await?;
    Ok(Json(
        products
            .into_iter()
            .skip((page - 1) * PRODUCTS_PER_PAGE)
            .take(PRODUCTS_PER_PAGE)
            .map(|product| product_response(&state, product))
            .collect(),
    ))
}

pub async fn list_low_stock(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductResponse>>, ApiFailure> {
    let repo = SqlProductRepository::new(state.db_pool.clone());
    let products = repo.list_low_stock().await?;
    Ok(Json(products.into_iter().map(|product| product_response(&state, product)).collect()))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiFailure> {
    if payload.sku.trim().is_empty() {
        return Err(ApiFailure::bad_request("sku must not be empty"));
    }
    if payload.name.trim().is_empty() {
        return Err(ApiFailure::bad_request("product name must not be empty"));
    }
    let steel_type = SteelType::parse(&payload.steel_type).ok_or_else(|| {
        ApiFailure::bad_request(format!("unknown steel type `{}`", payload.steel_type))
    })?;

    let categories = SqlCategoryRepository::new(state.db_pool.clone());
    let category_id = CategoryId(payload.category_id);
    if categories.find_by_id(&category_id).await?.is_none() {
        return Err(ApiFailure::bad_request(format!(
            "unknown category `{}`",
            payload.category_id
        )));
    }

    let now = Utc::now();
    let product = Product {
        id: ProductId(Uuid::new_v4()),
        sku: payload.sku.trim().to_string(),
        name: payload.name.trim().to_string(),
        description: payload.description,
        category_id,
        steel_type,
        thickness_mm: payload.thickness_mm,
        width_mm: payload.width_mm,
        length_mm: payload.length_mm,
        weight_per_meter: payload.weight_per_meter,
        unit_price: payload.unit_price,
        price_per_meter: payload.price_per_meter,
        price_per_kg: payload.price_per_kg,
        stock: payload.stock,
        minimum_stock: payload.minimum_stock,
        unit_of_measure: payload.unit_of_measure.unwrap_or_else(|| "unidad".to_string()),
        image: None,
        active: true,
        created_at: now,
        updated_at: now,
    };

    let repo = SqlProductRepository::new(state.db_pool.clone());
    repo.save(product.clone()).await?;

    info!(event_name = "catalog.product.created", product_id = %product.id, sku = %product.sku);
    Ok((StatusCode::CREATED, Json(product_response(&state, product))))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductResponse>, ApiFailure> {
    let repo = SqlProductRepository::new(state.db_pool.clone());
    let product = repo
        .find_by_id(&ProductId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("product"))?;
    Ok(Json(product_response(&state, product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiFailure> {
    let repo = SqlProductRepository::new(state.db_pool.clone());
    let mut product = repo
        .find_by_id(&ProductId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("product"))?;

    if let Some(name) = payload.name {
        if name.trim().is_empty() {
            return Err(ApiFailure::bad_request("product name must not be empty"));
        }
        product.name = name.trim().to_string();
    }
    if let Some(description) = payload.description {
        product.description = description;
    }
    if let Some(category) = payload.category_id {
        let categories = SqlCategoryRepository::new(state.db_pool.clone());
        let category_id = CategoryId(category);
        if categories.find_by_id(&category_id).await?.is_none() {
            return Err(ApiFailure::bad_request(format!("unknown category `{category}`")));
        }
        product.category_id = category_id;
    }
    if let Some(raw) = payload.steel_type {
        product.steel_type = SteelType::parse(&raw)
            .ok_or_else(|| ApiFailure::bad_request(format!("unknown steel type `{raw}`")))?;
    }
    if let Some(value) = payload.thickness_mm {
        product.thickness_mm = Some(value);
    }
    if let Some(value) = payload.width_mm {
        product.width_mm = Some(value);
    }
    if let Some(value) = payload.length_mm {
        product.length_mm = Some(value);
    }
    if let Some(value) = payload.weight_per_meter {
        product.weight_per_meter = Some(value);
    }
    if let Some(value) = payload.unit_price {
        product.unit_price = value;
    }
    if let Some(value) = payload.price_per_meter {
        product.price_per_meter = Some(value);
    }
    if let Some(value) = payload.price_per_kg {
        product.price_per_kg = Some(value);
    }
    if let Some(value) = payload.minimum_stock {
        product.minimum_stock = value;
    }
    if let Some(value) = payload.unit_of_measure {
        product.unit_of_measure = value;
    }
    if let Some(active) = payload.active {
        product.active = active;
    }
    product.updated_at = Utc::now();

    repo.save(product.clone()).await?;
    Ok(Json(product_response(&state, product)))
}

pub async fn deactivate_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    let repo = SqlProductRepository::new(state.db_pool.clone());
    let mut product = repo
        .find_by_id(&ProductId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("product"))?;

    product.active = false;
    product.updated_at = Utc::now();
    repo.save(product).await?;

    info!(event_name = "catalog.product.deactivated", product_id = %id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ImageQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<ImageResponse>), ApiFailure> {
    if body.is_empty() {
        return Err(ApiFailure::bad_request("image body must not be empty"));
    }

    let repo = SqlProductRepository::new(state.db_pool.clone());
    let mut product = repo
        .find_by_id(&ProductId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("product"))?;

    let stored = state.storage.save(&format!("products/{}", query.filename), &body).await?;
    let url = state.storage.url(&stored);

    product.image = Some(stored.clone());
    product.updated_at = Utc::now();
    repo.save(product).await?;

    info!(event_name = "catalog.product.image_uploaded", product_id = %id, object = %stored);
    Ok((StatusCode::CREATED, Json(ImageResponse { name: stored, url })))
}

pub async fn remove_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    let repo = SqlProductRepository::new(state.db_pool.clone());
    let mut product = repo
        .find_by_id(&ProductId(id))
        .await?
        .ok_or_else(|| ApiFailure::not_found("product"))?;

    if let Some(name) = product.image.take() {
        state.storage.delete(&name).await?;
        product.updated_at = Utc::now();
        repo.save(product).await?;
        info!(event_name = "catalog.product.image_removed", product_id = %id, object = %name);
    }
    Ok(StatusCode::NO_CONTENT)
}
