use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use pozinox_core::domain::inventory::{AlertKind, MovementKind, StockAlert, StockMovement};
use pozinox_core::domain::product::{Product, ProductId};
use pozinox_core::domain::supplier::SupplierId;

use super::decode::{parse_optional_uuid, parse_timestamp, parse_u32, parse_uuid};
use super::{InventoryRepository, RepositoryError};
use crate::DbPool;

pub struct SqlInventoryRepository {
    pool: DbPool,
}

impl SqlInventoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Write the stock counter a movement produced. Only the counter and the
/// update timestamp change; the rest of the product row is untouched.
pub(crate) async fn update_product_stock<'c, E>(
    executor: E,
    product: &Product,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'c, Database = sqlx::Sqlite>,
{
    sqlx::query("UPDATE product SET stock = ?, updated_at = ? WHERE id = ?")
        .bind(i64::from(product.stock))
        .bind(product.updated_at.to_rfc3339())
        .bind(product.id.0.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn insert_movement<'c, E>(
    executor: E,
    movement: &StockMovement,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'c, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO stock_movement (
            id,
            product_id,
            kind,
            reason,
            quantity,
            previous_stock,
            new_stock,
            document_number,
            supplier_id,
            recorded_by,
            recorded_at,
            notes
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(movement.id.to_string())
    .bind(movement.product_id.0.to_string())
    .bind(movement.kind.as_str())
    .bind(&movement.reason)
    .bind(i64::from(movement.quantity))
    .bind(i64::from(movement.previous_stock))
    .bind(i64::from(movement.new_stock))
    .bind(movement.document_number.as_deref())
    .bind(movement.supplier_id.as_ref().map(|id| id.0.to_string()))
    .bind(movement.recorded_by.to_string())
    .bind(movement.recorded_at.to_rfc3339())
    .bind(&movement.notes)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn upsert_alert<'c, E>(executor: E, alert: &StockAlert) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'c, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO stock_alert (
            id,
            product_id,
            kind,
            message,
            created_at,
            acknowledged
         ) VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            kind = excluded.kind,
            message = excluded.message,
            acknowledged = excluded.acknowledged",
    )
    .bind(alert.id.to_string())
    .bind(alert.product_id.0.to_string())
    .bind(alert.kind.as_str())
    .bind(&alert.message)
    .bind(alert.created_at.to_rfc3339())
    .bind(alert.acknowledged)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait::async_trait]
impl InventoryRepository for SqlInventoryRepository {
    async fn apply(
        &self,
        product: &Product,
        movement: &StockMovement,
        alert: Option<&StockAlert>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        update_product_stock(&mut *tx, product).await?;
        insert_movement(&mut *tx, movement).await?;
        if let Some(alert) = alert {
            upsert_alert(&mut *tx, alert).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn record_movement(&self, movement: StockMovement) -> Result<(), RepositoryError> {
        insert_movement(&self.pool, &movement).await?;
        Ok(())
    }

    async fn list_movements_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<StockMovement>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                id,
                product_id,
                kind,
                reason,
                quantity,
                previous_stock,
                new_stock,
                document_number,
                supplier_id,
                recorded_by,
                recorded_at,
                notes
             FROM stock_movement
             WHERE product_id = ?
             ORDER BY recorded_at DESC",
        )
        .bind(product_id.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(movement_from_row).collect()
    }

    async fn save_alert(&self, alert: StockAlert) -> Result<(), RepositoryError> {
        upsert_alert(&self.pool, &alert).await?;
        Ok(())
    }

    async fn list_open_alerts(&self) -> Result<Vec<StockAlert>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, product_id, kind, message, created_at, acknowledged
             FROM stock_alert
             WHERE acknowledged = 0
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(alert_from_row).collect()
    }

    async fn acknowledge_alert(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE stock_alert SET acknowledged = 1 WHERE id = ? AND acknowledged = 0")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn movement_from_row(row: SqliteRow) -> Result<StockMovement, RepositoryError> {
    let kind_raw = row.try_get::<String, _>("kind")?;
    let kind = MovementKind::parse(&kind_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown movement kind `{kind_raw}`")))?;

    Ok(StockMovement {
        id: parse_uuid("id", row.try_get("id")?)?,
        product_id: ProductId(parse_uuid("product_id", row.try_get("product_id")?)?),
        kind,
        reason: row.try_get("reason")?,
        quantity: parse_u32("quantity", row.try_get("quantity")?)?,
        previous_stock: parse_u32("previous_stock", row.try_get("previous_stock")?)?,
        new_stock: parse_u32("new_stock", row.try_get("new_stock")?)?,
        document_number: row.try_get("document_number")?,
        supplier_id: parse_optional_uuid("supplier_id", row.try_get("supplier_id")?)?
            .map(SupplierId),
        recorded_by: parse_uuid("recorded_by", row.try_get("recorded_by")?)?,
        recorded_at: parse_timestamp("recorded_at", row.try_get("recorded_at")?)?,
        notes: row.try_get("notes")?,
    })
}

fn alert_from_row(row: SqliteRow) -> Result<StockAlert, RepositoryError> {
    let kind_raw = row.try_get::<String, _>("kind")?;
    let kind = AlertKind::parse(&kind_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown alert kind `{kind_raw}`")))?;

    Ok(StockAlert {
        id: parse_uuid("id", row.try_get("id")?)?,
        product_id: ProductId(parse_uuid("product_id", row.try_get("product_id")?)?),
        kind,
        message: row.try_get("message")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        acknowledged: row.try_get("acknowledged")?,
    })
}
