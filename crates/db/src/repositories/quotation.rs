use sqlx::{sqlite::SqliteRow, Row};
use tracing::warn;
use uuid::Uuid;

use pozinox_core::domain::product::ProductId;
use pozinox_core::domain::quotation::{
    LineId, Quotation, QuotationId, QuotationLine, QuotationStatus,
};
use pozinox_core::numbering::{next_number, DocumentKind};

use super::decode::{
    parse_decimal, parse_optional_timestamp, parse_timestamp, parse_u32, parse_uuid,
};
use super::{
    date_prefix, is_unique_violation, QuotationRepository, RepositoryError,
    NUMBER_ALLOCATION_ATTEMPTS,
};
use crate::DbPool;

pub struct SqlQuotationRepository {
    pool: DbPool,
}

impl SqlQuotationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_lines(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<QuotationLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, product_id, quantity, unit_price, subtotal
             FROM quotation_line
             WHERE quotation_id = ?
             ORDER BY rowid ASC",
        )
        .bind(quotation_id.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(line_from_row).collect()
    }

    async fn hydrate(&self, row: SqliteRow) -> Result<Quotation, RepositoryError> {
        let mut quotation = header_from_row(row)?;
        quotation.lines = self.load_lines(&quotation.id).await?;
        Ok(quotation)
    }

    async fn find_one(
        &self,
        sql: &str,
        bind: &str,
    ) -> Result<Option<Quotation>, RepositoryError> {
        let row = sqlx::query(sql).bind(bind).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn write(
        &self,
        quotation: &Quotation,
        number: &str,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO quotation (
                id,
                number,
                owner_id,
                status,
                subtotal,
                tax,
                total,
                notes,
                created_at,
                updated_at,
                finalized_at,
                mercadopago_preference_id,
                mercadopago_payment_id
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                subtotal = excluded.subtotal,
                tax = excluded.tax,
                total = excluded.total,
                notes = excluded.notes,
                updated_at = excluded.updated_at,
                finalized_at = excluded.finalized_at,
                mercadopago_preference_id = excluded.mercadopago_preference_id,
                mercadopago_payment_id = excluded.mercadopago_payment_id",
        )
        .bind(quotation.id.0.to_string())
        .bind(number)
        .bind(quotation.owner_id.to_string())
        .bind(quotation.status.as_str())
        .bind(quotation.subtotal.to_string())
        .bind(quotation.tax.to_string())
        .bind(quotation.total.to_string())
        .bind(&quotation.notes)
        .bind(quotation.created_at.to_rfc3339())
        .bind(quotation.updated_at.to_rfc3339())
        .bind(quotation.finalized_at.map(|value| value.to_rfc3339()))
        .bind(quotation.mercadopago_preference_id.as_deref())
        .bind(quotation.mercadopago_payment_id.as_deref())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM quotation_line WHERE quotation_id = ?")
            .bind(quotation.id.0.to_string())
            .execute(&mut *tx)
            .await?;

        for line in &quotation.lines {
            sqlx::query(
                "INSERT INTO quotation_line (
                    id,
                    quotation_id,
                    product_id,
                    quantity,
                    unit_price,
                    subtotal
                 ) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(line.id.0.to_string())
            .bind(quotation.id.0.to_string())
            .bind(line.product_id.0.to_string())
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.to_string())
            .bind(line.subtotal.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}

const QUOTATION_COLUMNS: &str = "id,
                number,
                owner_id,
                status,
                subtotal,
                tax,
                total,
                notes,
                created_at,
                updated_at,
                finalized_at,
                mercadopago_preference_id,
                mercadopago_payment_id";

#[async_trait::async_trait]
impl QuotationRepository for SqlQuotationRepository {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        self.find_one(
            &format!("SELECT {QUOTATION_COLUMNS} FROM quotation WHERE id = ?"),
            &id.0.to_string(),
        )
        .await
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Quotation>, RepositoryError> {
        self.find_one(
            &format!("SELECT {QUOTATION_COLUMNS} FROM quotation WHERE number = ?"),
            number,
        )
        .await
    }

    async fn find_draft_for_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Option<Quotation>, RepositoryError> {
        self.find_one(
            &format!(
                "SELECT {QUOTATION_COLUMNS}
                 FROM quotation
                 WHERE owner_id = ? AND status = 'draft'
                 ORDER BY created_at DESC
                 LIMIT 1"
            ),
            &owner_id.to_string(),
        )
        .await
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Quotation>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTATION_COLUMNS}
             FROM quotation
             WHERE owner_id = ?
             ORDER BY created_at DESC"
        ))
        .bind(owner_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut quotations = Vec::with_capacity(rows.len());
        for row in rows {
            quotations.push(self.hydrate(row).await?);
        }
        Ok(quotations)
    }

    async fn create(&self, mut quotation: Quotation) -> Result<Quotation, RepositoryError> {
        let date = quotation.created_at.date_naive();

        for attempt in 1..=NUMBER_ALLOCATION_ATTEMPTS {
            let created_so_far = sqlx::query(
                "SELECT COUNT(*) AS count FROM quotation WHERE created_at LIKE ?",
            )
            .bind(date_prefix(date))
            .fetch_one(&self.pool)
            .await?
            .get::<i64, _>("count");

            let number = next_number(
                DocumentKind::Quotation,
                date,
                parse_u32("count", created_so_far)?,
            );

            match self.write(&quotation, &number).await {
                Ok(()) => {
                    quotation.number = number;
                    return Ok(quotation);
                }
                Err(error) if is_unique_violation(&error) => {
                    warn!(
                        event_name = "db.quotation.number_collision",
                        number = %number,
                        attempt,
                    );
                }
                Err(error) => return Err(RepositoryError::Database(error)),
            }
        }

        Err(RepositoryError::Conflict(
            "could not allocate a quotation number after repeated collisions".to_string(),
        ))
    }

    async fn save(&self, quotation: &Quotation) -> Result<(), RepositoryError> {
        self.write(quotation, &quotation.number).await.map_err(RepositoryError::Database)
    }
}

fn header_from_row(row: SqliteRow) -> Result<Quotation, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = QuotationStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown quotation status `{status_raw}`"))
    })?;

    Ok(Quotation {
        id: QuotationId(parse_uuid("id", row.try_get("id")?)?),
        number: row.try_get("number")?,
        owner_id: parse_uuid("owner_id", row.try_get("owner_id")?)?,
        status,
        lines: Vec::new(),
        subtotal: parse_decimal("subtotal", row.try_get("subtotal")?)?,
        tax: parse_decimal("tax", row.try_get("tax")?)?,
        total: parse_decimal("total", row.try_get("total")?)?,
        notes: row.try_get("notes")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
        finalized_at: parse_optional_timestamp("finalized_at", row.try_get("finalized_at")?)?,
        mercadopago_preference_id: row.try_get("mercadopago_preference_id")?,
        mercadopago_payment_id: row.try_get("mercadopago_payment_id")?,
    })
}

fn line_from_row(row: SqliteRow) -> Result<QuotationLine, RepositoryError> {
    Ok(QuotationLine {
        id: LineId(parse_uuid("id", row.try_get("id")?)?),
        product_id: ProductId(parse_uuid("product_id", row.try_get("product_id")?)?),
        quantity: parse_u32("quantity", row.try_get("quantity")?)?,
        unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
        subtotal: parse_decimal("subtotal", row.try_get("subtotal")?)?,
    })
}
