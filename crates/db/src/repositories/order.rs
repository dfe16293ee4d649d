use sqlx::{sqlite::SqliteRow, Row};
use tracing::warn;
use uuid::Uuid;

use pozinox_core::domain::customer::CustomerId;
use pozinox_core::domain::order::{Order, OrderId, OrderLine, OrderStatus, PaymentMethod};
use pozinox_core::domain::product::ProductId;
use pozinox_core::numbering::{next_number, DocumentKind};

use super::decode::{
    parse_decimal, parse_optional_date, parse_timestamp, parse_u32, parse_uuid,
};
use super::{
    date_prefix, is_unique_violation, OrderRepository, RepositoryError,
    NUMBER_ALLOCATION_ATTEMPTS,
};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_lines(&self, order_id: &OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT product_id, quantity, unit_price, discount_percent, subtotal
             FROM order_line
             WHERE order_id = ?
             ORDER BY rowid ASC",
        )
        .bind(order_id.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(line_from_row).collect()
    }

    async fn hydrate(&self, row: SqliteRow) -> Result<Order, RepositoryError> {
        let mut order = header_from_row(row)?;
        order.lines = self.load_lines(&order.id).await?;
        Ok(order)
    }

    async fn write(&self, order: &Order, number: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (
                id,
                number,
                customer_id,
                status,
                payment_method,
                subtotal,
                discount,
                tax,
                total,
                delivery_date,
                notes,
                internal_notes,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                payment_method = excluded.payment_method,
                subtotal = excluded.subtotal,
                discount = excluded.discount,
                tax = excluded.tax,
                total = excluded.total,
                delivery_date = excluded.delivery_date,
                notes = excluded.notes,
                internal_notes = excluded.internal_notes",
        )
        .bind(order.id.0.to_string())
        .bind(number)
        .bind(order.customer_id.0.to_string())
        .bind(order.status.as_str())
        .bind(order.payment_method.as_str())
        .bind(order.subtotal.to_string())
        .bind(order.discount.to_string())
        .bind(order.tax.to_string())
        .bind(order.total.to_string())
        .bind(order.delivery_date.map(|date| date.format("%Y-%m-%d").to_string()))
        .bind(&order.notes)
        .bind(&order.internal_notes)
        .bind(order.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM order_line WHERE order_id = ?")
            .bind(order.id.0.to_string())
            .execute(&mut *tx)
            .await?;

        for line in &order.lines {
            sqlx::query(
                "INSERT INTO order_line (
                    id,
                    order_id,
                    product_id,
                    quantity,
                    unit_price,
                    discount_percent,
                    subtotal
                 ) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(order.id.0.to_string())
            .bind(line.product_id.0.to_string())
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.to_string())
            .bind(line.discount_percent.to_string())
            .bind(line.subtotal.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}

const ORDER_COLUMNS: &str = "id,
                number,
                customer_id,
                status,
                payment_method,
                subtotal,
                discount,
                tax,
                total,
                delivery_date,
                notes,
                internal_notes,
                created_at";

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
            .bind(id.0.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS}
             FROM orders
             WHERE customer_id = ?
             ORDER BY created_at DESC"
        ))
        .bind(customer_id.0.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    async fn create(&self, mut order: Order) -> Result<Order, RepositoryError> {
        let date = order.created_at.date_naive();

        for attempt in 1..=NUMBER_ALLOCATION_ATTEMPTS {
            let created_so_far =
                sqlx::query("SELECT COUNT(*) AS count FROM orders WHERE created_at LIKE ?")
                    .bind(date_prefix(date))
                    .fetch_one(&self.pool)
                    .await?
                    .get::<i64, _>("count");

            let number =
                next_number(DocumentKind::Order, date, parse_u32("count", created_so_far)?);

            match self.write(&order, &number).await {
                Ok(()) => {
                    order.number = number;
                    return Ok(order);
                }
                Err(error) if is_unique_violation(&error) => {
                    warn!(
                        event_name = "db.order.number_collision",
                        number = %number,
                        attempt,
                    );
                }
                Err(error) => return Err(RepositoryError::Database(error)),
            }
        }

        Err(RepositoryError::Conflict(
            "could not allocate an order number after repeated collisions".to_string(),
        ))
    }

    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        self.write(order, &order.number).await.map_err(RepositoryError::Database)
    }
}

fn header_from_row(row: SqliteRow) -> Result<Order, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = OrderStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown order status `{status_raw}`")))?;

    let payment_method_raw = row.try_get::<String, _>("payment_method")?;
    let payment_method = PaymentMethod::parse(&payment_method_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown payment method `{payment_method_raw}`"))
    })?;

    Ok(Order {
        id: OrderId(parse_uuid("id", row.try_get("id")?)?),
        number: row.try_get("number")?,
        customer_id: CustomerId(parse_uuid("customer_id", row.try_get("customer_id")?)?),
        status,
        payment_method,
        lines: Vec::new(),
        subtotal: parse_decimal("subtotal", row.try_get("subtotal")?)?,
        discount: parse_decimal("discount", row.try_get("discount")?)?,
        tax: parse_decimal("tax", row.try_get("tax")?)?,
        total: parse_decimal("total", row.try_get("total")?)?,
        delivery_date: parse_optional_date("delivery_date", row.try_get("delivery_date")?)?,
        notes: row.try_get("notes")?,
        internal_notes: row.try_get("internal_notes")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn line_from_row(row: SqliteRow) -> Result<OrderLine, RepositoryError> {
    Ok(OrderLine {
        product_id: ProductId(parse_uuid("product_id", row.try_get("product_id")?)?),
        quantity: parse_u32("quantity", row.try_get("quantity")?)?,
        unit_price: parse_decimal("unit_price", row.try_get("unit_price")?)?,
        discount_percent: parse_decimal("discount_percent", row.try_get("discount_percent")?)?,
        subtotal: parse_decimal("subtotal", row.try_get("subtotal")?)?,
    })
}
