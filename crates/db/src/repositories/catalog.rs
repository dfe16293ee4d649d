use sqlx::{sqlite::SqliteRow, Row};

use pozinox_core::domain::category::{Category, CategoryId};
use pozinox_core::domain::product::{Product, ProductId, SteelType};

use super::decode::{
    parse_decimal, parse_optional_decimal, parse_timestamp, parse_u32, parse_uuid,
};
use super::{CategoryRepository, ProductFilter, ProductRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCategoryRepository {
    pool: DbPool,
}

impl SqlCategoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CategoryRepository for SqlCategoryRepository {
    async fn find_by_id(&self, id: &CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, description, active FROM category WHERE id = ?",
        )
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(category_from_row).transpose()
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Category>, RepositoryError> {
        let rows = if include_inactive {
            sqlx::query("SELECT id, name, description, active FROM category ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query(
                "SELECT id, name, description, active
                 FROM category
                 WHERE active = 1
                 ORDER BY name ASC",
            )
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(category_from_row).collect()
    }

    async fn save(&self, category: Category) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO category (id, name, description, active)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                active = excluded.active",
        )
        .bind(category.id.0.to_string())
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const PRODUCT_COLUMNS: &str = "id,
                sku,
                name,
                description,
                category_id,
                steel_type,
                thickness_mm,
                width_mm,
                length_mm,
                weight_per_meter,
                unit_price,
                price_per_meter,
                price_per_kg,
                stock,
                minimum_stock,
                unit_of_measure,
                image,
                active,
                created_at,
                updated_at";

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?"
        ))
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(product_from_row).transpose()
    }

    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE sku = ?"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        row.map(product_from_row).transpose()
    }

    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE 1 = 1");
        if !filter.include_inactive {
            sql.push_str(" AND active = 1");
        }
        if filter.category_id.is_some() {
            sql.push_str(" AND category_id = ?");
        }
        if filter.steel_type.is_some() {
            sql.push_str(" AND steel_type = ?");
        }
        if filter.search.is_some() {
            sql.push_str(" AND (name LIKE ? OR sku LIKE ? OR description LIKE ?)");
        }
        sql.push_str(" ORDER BY name ASC");

        let mut query = sqlx::query(&sql);
        if let Some(category_id) = &filter.category_id {
            query = query.bind(category_id.0.to_string());
        }
        if let Some(steel_type) = filter.steel_type {
            query = query.bind(steel_type.as_str());
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", search.trim());
            query = query.bind(pattern.clone()).bind(pattern.clone()).bind(pattern);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(product_from_row).collect()
    }

    async fn list_low_stock(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM product
             WHERE active = 1 AND stock <= minimum_stock
             ORDER BY stock ASC, name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(product_from_row).collect()
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product (
                id,
                sku,
                name,
                description,
                category_id,
                steel_type,
                thickness_mm,
                width_mm,
                length_mm,
                weight_per_meter,
                unit_price,
                price_per_meter,
                price_per_kg,
                stock,
                minimum_stock,
                unit_of_measure,
                image,
                active,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                sku = excluded.sku,
                name = excluded.name,
                description = excluded.description,
                category_id = excluded.category_id,
                steel_type = excluded.steel_type,
                thickness_mm = excluded.thickness_mm,
                width_mm = excluded.width_mm,
                length_mm = excluded.length_mm,
                weight_per_meter = excluded.weight_per_meter,
                unit_price = excluded.unit_price,
                price_per_meter = excluded.price_per_meter,
                price_per_kg = excluded.price_per_kg,
                stock = excluded.stock,
                minimum_stock = excluded.minimum_stock,
                unit_of_measure = excluded.unit_of_measure,
                image = excluded.image,
                active = excluded.active,
                updated_at = excluded.updated_at",
        )
        .bind(product.id.0.to_string())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.category_id.0.to_string())
        .bind(product.steel_type.as_str())
        .bind(product.thickness_mm.map(|value| value.to_string()))
        .bind(product.width_mm.map(|value| value.to_string()))
        .bind(product.length_mm.map(|value| value.to_string()))
        .bind(product.weight_per_meter.map(|value| value.to_string()))
        .bind(product.unit_price.to_string())
        .bind(product.price_per_meter.map(|value| value.to_string()))
        .bind(product.price_per_kg.map(|value| value.to_string()))
        .bind(i64::from(product.stock))
        .bind(i64::from(product.minimum_stock))
        .bind(&product.unit_of_measure)
        .bind(product.image.as_deref())
        .bind(product.active)
        .bind(product.created_at.to_rfc3339())
        .bind(product.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if super::is_unique_violation(&error) {
                RepositoryError::Conflict(format!("sku `{}` is already taken", product.sku))
            } else {
                RepositoryError::Database(error)
            }
        })?;

        Ok(())
    }
}

fn category_from_row(row: SqliteRow) -> Result<Category, RepositoryError> {
    Ok(Category {
        id: CategoryId(parse_uuid("id", row.try_get("id")?)?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        active: row.try_get("active")?,
    })
}

pub(crate) fn product_from_row(row: SqliteRow) -> Result<Product, RepositoryError> {
    let steel_type_raw = row.try_get::<String, _>("steel_type")?;
    let steel_type = SteelType::parse(&steel_type_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown steel type `{steel_type_raw}`"))
    })?;

    Ok(Product {
        id: ProductId(parse_uuid("id", row.try_get("id")?)?),
        sku: row.try_get("sku")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category_id: CategoryId(parse_uuid("category_id", row.try_get("category_id")?)?),
        steel_type,
        thickness_mm: parse_optional_decimal("thickness_mm", row.try_get("thickness_mm")?)?,
        width_mm: parse_optional_decimal("width_mm", row.try_get("width_mm")?)?,
        length_mm: parse_optional_decimal("length_mm", row.try_get("length_mm")?)?,
        weight_per_meter: parse_optional_decimal(
            "weight_per_meter",
            row.try_get("weight_per_meter")?,
        )?,
        unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
        price_per_meter: parse_optional_decimal(
            "price_per_meter",
            row.try_get("price_per_meter")?,
        )?,
        price_per_kg: parse_optional_decimal("price_per_kg", row.try_get("price_per_kg")?)?,
        stock: parse_u32("stock", row.try_get("stock")?)?,
        minimum_stock: parse_u32("minimum_stock", row.try_get("minimum_stock")?)?,
        unit_of_measure: row.try_get("unit_of_measure")?,
        image: row.try_get("image")?,
        active: row.try_get("active")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
