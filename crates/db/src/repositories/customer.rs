use sqlx::{sqlite::SqliteRow, Row};

use pozinox_core::domain::customer::{Customer, CustomerId, CustomerKind};

use super::decode::{parse_timestamp, parse_uuid};
use super::{is_unique_violation, CustomerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const CUSTOMER_COLUMNS: &str = "id,
                kind,
                first_name,
                last_name,
                company_name,
                tax_id,
                email,
                phone,
                alternate_phone,
                address,
                commune,
                city,
                postal_code,
                active,
                registered_at";

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE id = ?"
        ))
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(customer_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE email = ? LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(customer_from_row).transpose()
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Customer>, RepositoryError> {
        let rows = if include_inactive {
            sqlx::query(&format!(
                "SELECT {CUSTOMER_COLUMNS}
                 FROM customer
                 ORDER BY last_name ASC, first_name ASC"
            ))
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {CUSTOMER_COLUMNS}
                 FROM customer
                 WHERE active = 1
                 ORDER BY last_name ASC, first_name ASC"
            ))
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(customer_from_row).collect()
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO customer (
                id,
                kind,
                first_name,
                last_name,
                company_name,
                tax_id,
                email,
                phone,
                alternate_phone,
                address,
                commune,
                city,
                postal_code,
                active,
                registered_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                company_name = excluded.company_name,
                tax_id = excluded.tax_id,
                email = excluded.email,
                phone = excluded.phone,
                alternate_phone = excluded.alternate_phone,
                address = excluded.address,
                commune = excluded.commune,
                city = excluded.city,
                postal_code = excluded.postal_code,
                active = excluded.active",
        )
        .bind(customer.id.0.to_string())
        .bind(customer.kind.as_str())
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.company_name)
        .bind(&customer.tax_id)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.alternate_phone)
        .bind(&customer.address)
        .bind(&customer.commune)
        .bind(&customer.city)
        .bind(&customer.postal_code)
        .bind(customer.active)
        .bind(customer.registered_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                RepositoryError::Conflict(format!(
                    "customer email or tax id already registered: {}",
                    customer.email
                ))
            } else {
                RepositoryError::Database(error)
            }
        })?;

        Ok(())
    }
}

fn customer_from_row(row: SqliteRow) -> Result<Customer, RepositoryError> {
    let kind_raw = row.try_get::<String, _>("kind")?;
    let kind = CustomerKind::parse(&kind_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown customer kind `{kind_raw}`")))?;

    Ok(Customer {
        id: CustomerId(parse_uuid("id", row.try_get("id")?)?),
        kind,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        company_name: row.try_get("company_name")?,
        tax_id: row.try_get("tax_id")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        alternate_phone: row.try_get("alternate_phone")?,
        address: row.try_get("address")?,
        commune: row.try_get("commune")?,
        city: row.try_get("city")?,
        postal_code: row.try_get("postal_code")?,
        active: row.try_get("active")?,
        registered_at: parse_timestamp("registered_at", row.try_get("registered_at")?)?,
    })
}
