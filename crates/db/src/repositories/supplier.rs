use sqlx::{sqlite::SqliteRow, Row};

use pozinox_core::domain::supplier::{Supplier, SupplierId};

use super::decode::{parse_timestamp, parse_u32, parse_uuid};
use super::{is_unique_violation, RepositoryError, SupplierRepository};
use crate::DbPool;

pub struct SqlSupplierRepository {
    pool: DbPool,
}

impl SqlSupplierRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SUPPLIER_COLUMNS: &str = "id,
                name,
                company_name,
                tax_id,
                email,
                phone,
                address,
                commune,
                city,
                contact_name,
                lead_time_days,
                payment_terms,
                active,
                registered_at,
                notes";

#[async_trait::async_trait]
impl SupplierRepository for SqlSupplierRepository {
    async fn find_by_id(&self, id: &SupplierId) -> Result<Option<Supplier>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM supplier WHERE id = ?"
        ))
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(supplier_from_row).transpose()
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Supplier>, RepositoryError> {
        let rows = if include_inactive {
            sqlx::query(&format!(
                "SELECT {SUPPLIER_COLUMNS} FROM supplier ORDER BY name ASC"
            ))
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {SUPPLIER_COLUMNS} FROM supplier WHERE active = 1 ORDER BY name ASC"
            ))
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(supplier_from_row).collect()
    }

    async fn save(&self, supplier: Supplier) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO supplier (
                id,
                name,
                company_name,
                tax_id,
                email,
                phone,
                address,
                commune,
                city,
                contact_name,
                lead_time_days,
                payment_terms,
                active,
                registered_at,
                notes
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                company_name = excluded.company_name,
                tax_id = excluded.tax_id,
                email = excluded.email,
                phone = excluded.phone,
                address = excluded.address,
                commune = excluded.commune,
                city = excluded.city,
                contact_name = excluded.contact_name,
                lead_time_days = excluded.lead_time_days,
                payment_terms = excluded.payment_terms,
                active = excluded.active,
                notes = excluded.notes",
        )
        .bind(supplier.id.0.to_string())
        .bind(&supplier.name)
        .bind(&supplier.company_name)
        .bind(&supplier.tax_id)
        .bind(&supplier.email)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(&supplier.commune)
        .bind(&supplier.city)
        .bind(&supplier.contact_name)
        .bind(i64::from(supplier.lead_time_days))
        .bind(&supplier.payment_terms)
        .bind(supplier.active)
        .bind(supplier.registered_at.to_rfc3339())
        .bind(&supplier.notes)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                RepositoryError::Conflict(format!(
                    "supplier tax id already registered: {}",
                    supplier.tax_id
                ))
            } else {
                RepositoryError::Database(error)
            }
        })?;

        Ok(())
    }
}

fn supplier_from_row(row: SqliteRow) -> Result<Supplier, RepositoryError> {
    Ok(Supplier {
        id: SupplierId(parse_uuid("id", row.try_get("id")?)?),
        name: row.try_get("name")?,
        company_name: row.try_get("company_name")?,
        tax_id: row.try_get("tax_id")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        address: row.try_get("address")?,
        commune: row.try_get("commune")?,
        city: row.try_get("city")?,
        contact_name: row.try_get("contact_name")?,
        lead_time_days: parse_u32("lead_time_days", row.try_get("lead_time_days")?)?,
        payment_terms: row.try_get("payment_terms")?,
        active: row.try_get("active")?,
        registered_at: parse_timestamp("registered_at", row.try_get("registered_at")?)?,
        notes: row.try_get("notes")?,
    })
}
