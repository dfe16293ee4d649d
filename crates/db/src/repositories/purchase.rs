use sqlx::{sqlite::SqliteRow, Row};
use tracing::warn;
use uuid::Uuid;

use pozinox_core::domain::inventory::StockMovement;
use pozinox_core::domain::product::{Product, ProductId};
use pozinox_core::domain::purchase::{Purchase, PurchaseId, PurchaseLine, PurchaseStatus};
use pozinox_core::domain::supplier::SupplierId;
use pozinox_core::numbering::{next_number, DocumentKind};

use super::decode::{
    parse_date, parse_decimal, parse_optional_date, parse_timestamp, parse_u32, parse_uuid,
};
use super::inventory::{insert_movement, update_product_stock};
use super::{
    date_prefix, is_unique_violation, PurchaseRepository, RepositoryError,
    NUMBER_ALLOCATION_ATTEMPTS,
};
use crate::DbPool;

pub struct SqlPurchaseRepository {
    pool: DbPool,
}

impl SqlPurchaseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_lines(
        &self,
        purchase_id: &PurchaseId,
    ) -> Result<Vec<PurchaseLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT product_id, quantity_ordered, quantity_received, unit_price, subtotal
             FROM purchase_line
             WHERE purchase_id = ?
             ORDER BY rowid ASC",
        )
        .bind(purchase_id.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(line_from_row).collect()
    }

    async fn hydrate(&self, row: SqliteRow) -> Result<Purchase, RepositoryError> {
        let mut purchase = header_from_row(row)?;
        purchase.lines = self.load_lines(&purchase.id).await?;
        Ok(purchase)
    }

    async fn write(&self, purchase: &Purchase, number: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        Self::write_with(&mut tx, purchase, number).await?;
        tx.commit().await
    }

    async fn write_with(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        purchase: &Purchase,
        number: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO purchase (
                id,
                number,
                supplier_id,
                status,
                subtotal,
                tax,
                total,
                expected_date,
                received_date,
                created_by,
                notes,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                subtotal = excluded.subtotal,
                tax = excluded.tax,
                total = excluded.total,
                expected_date = excluded.expected_date,
                received_date = excluded.received_date,
                notes = excluded.notes",
        )
        .bind(purchase.id.0.to_string())
        .bind(number)
        .bind(purchase.supplier_id.0.to_string())
        .bind(purchase.status.as_str())
        .bind(purchase.subtotal.to_string())
        .bind(purchase.tax.to_string())
        .bind(purchase.total.to_string())
        .bind(purchase.expected_date.format("%Y-%m-%d").to_string())
        .bind(purchase.received_date.map(|date| date.format("%Y-%m-%d").to_string()))
        .bind(purchase.created_by.to_string())
        .bind(&purchase.notes)
        .bind(purchase.created_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;

        sqlx::query("DELETE FROM purchase_line WHERE purchase_id = ?")
            .bind(purchase.id.0.to_string())
            .execute(&mut **tx)
            .await?;

        for line in &purchase.lines {
            sqlx::query(
                "INSERT INTO purchase_line (
                    id,
                    purchase_id,
                    product_id,
                    quantity_ordered,
                    quantity_received,
                    unit_price,
                    subtotal
                 ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(purchase.id.0.to_string())
            .bind(line.product_id.0.to_string())
            .bind(i64::from(line.quantity_ordered))
            .bind(i64::from(line.quantity_received))
            .bind(line.unit_price.to_string())
            .bind(line.subtotal.to_string())
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

const PURCHASE_COLUMNS: &str = "id,
                number,
                supplier_id,
                status,
                subtotal,
                tax,
                total,
                expected_date,
                received_date,
                created_by,
                notes,
                created_at";

#[async_trait::async_trait]
impl PurchaseRepository for SqlPurchaseRepository {
    async fn find_by_id(&self, id: &PurchaseId) -> Result<Option<Purchase>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchase WHERE id = ?"
        ))
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Purchase>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchase ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut purchases = Vec::with_capacity(rows.len());
        for row in rows {
            purchases.push(self.hydrate(row).await?);
        }
        Ok(purchases)
    }

    async fn create(&self, mut purchase: Purchase) -> Result<Purchase, RepositoryError> {
        let date = purchase.created_at.date_naive();

        for attempt in 1..=NUMBER_ALLOCATION_ATTEMPTS {
            let created_so_far =
                sqlx::query("SELECT COUNT(*) AS count FROM purchase WHERE created_at LIKE ?")
                    .bind(date_prefix(date))
                    .fetch_one(&self.pool)
                    .await?
                    .get::<i64, _>("count");

            let number =
                next_number(DocumentKind::Purchase, date, parse_u32("count", created_so_far)?);

            match self.write(&purchase, &number).await {
                Ok(()) => {
                    purchase.number = number;
                    return Ok(purchase);
                }
                Err(error) if is_unique_violation(&error) => {
                    warn!(
                        event_name = "db.purchase.number_collision",
                        number = %number,
                        attempt,
                    );
                }
                Err(error) => return Err(RepositoryError::Database(error)),
            }
        }

        Err(RepositoryError::Conflict(
            "could not allocate a purchase number after repeated collisions".to_string(),
        ))
    }

    async fn save(&self, purchase: &Purchase) -> Result<(), RepositoryError> {
        self.write(purchase, &purchase.number).await.map_err(RepositoryError::Database)
    }

    async fn record_receipt(
        &self,
        purchase: &Purchase,
        product: &Product,
        movement: &StockMovement,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        Self::write_with(&mut tx, purchase, &purchase.number).await?;
        update_product_stock(&mut *tx, product).await?;
        insert_movement(&mut *tx, movement).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn header_from_row(row: SqliteRow) -> Result<Purchase, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = PurchaseStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown purchase status `{status_raw}`"))
    })?;

    Ok(Purchase {
        id: PurchaseId(parse_uuid("id", row.try_get("id")?)?),
        number: row.try_get("number")?,
        supplier_id: SupplierId(parse_uuid("supplier_id", row.try_get("supplier_id")?)?),
        status,
        expected_date: parse_date("expected_date", row.try_get("expected_date")?)?,
        received_date: parse_optional_date("received_date", row.try_get("received_date")?)?,
        lines: Vec::new(),
        subtotal: parse_decimal("subtotal", row.try_get("subtotal")?)?,
        tax: parse_decimal("tax", row.try_get("tax")?)?,
        total: parse_decimal("total", row.try_get("total")?)?,
        created_by: parse_uuid("created_by", row.try_get("created_by")?)?,
        notes: row.try_get("notes")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn line_from_row(row: SqliteRow) -> Result<PurchaseLine, RepositoryError> {
    Ok(PurchaseLine {
        product_id: ProductId(parse_uuid("product_id", row.try_get("product_id")?)?),
        quantity_ordered: parse_u32("quantity_ordered", row.try_get("quantity_ordered")?)?,
        quantity_received: parse_u32("quantity_received", row.try_get("quantity_received")?)?,
        unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
        subtotal: parse_decimal("subtotal", row.try_get("subtotal")?)?,
    })
}
