use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::product::{Product, ProductId};
use crate::domain::supplier::SupplierId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Inbound,
    Outbound,
    Adjustment,
    Transfer,
    Return,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
            Self::Adjustment => "adjustment",
            Self::Transfer => "transfer",
            Self::Return => "return",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            "adjustment" => Some(Self::Adjustment),
            "transfer" => Some(Self::Transfer),
            "return" => Some(Self::Return),
            _ => None,
        }
    }

    /// Whether this movement adds units to the product's stock.
    pub fn is_additive(&self) -> bool {
        matches!(self, Self::Inbound | Self::Return)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundReason {
    Purchase,
    CustomerReturn,
    InventoryAdjustment,
    TransferIn,
    InitialInventory,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundReason {
    Sale,
    SupplierReturn,
    InventoryAdjustment,
    TransferOut,
    Loss,
    Sample,
}

/// An entry in the product's stock history. `previous_stock` and
/// `new_stock` capture the counter before and after the movement was
/// applied, so the history is auditable without replaying it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub reason: String,
    pub quantity: u32,
    pub previous_stock: u32,
    pub new_stock: u32,
    pub document_number: Option<String>,
    pub supplier_id: Option<SupplierId>,
    pub recorded_by: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub notes: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowStock,
    CriticalStock,
    OutOfStock,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowStock => "low_stock",
            Self::CriticalStock => "critical_stock",
            Self::OutOfStock => "out_of_stock",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low_stock" => Some(Self::LowStock),
            "critical_stock" => Some(Self::CriticalStock),
            "out_of_stock" => Some(Self::OutOfStock),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub id: Uuid,
    pub product_id: ProductId,
    pub kind: AlertKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
}

/// Apply a movement to the product's stock counter and build the history
/// entry. The caller persists both in one transaction.
pub fn apply_movement(
    product: &mut Product,
    kind: MovementKind,
    reason: impl Into<String>,
    quantity: u32,
    recorded_by: Uuid,
    now: DateTime<Utc>,
) -> Result<StockMovement, DomainError> {
    if quantity == 0 {
        return Err(DomainError::InvalidArgument(
            "movement quantity must be greater than zero".to_string(),
        ));
    }

    let previous_stock = product.stock;
    let new_stock = if kind.is_additive() {
        previous_stock.checked_add(quantity).ok_or_else(|| {
            DomainError::InvalidArgument("stock counter would overflow".to_string())
        })?
    } else {
        if quantity > previous_stock {
            return Err(DomainError::InsufficientStock {
                id: product.id.clone(),
                requested: quantity,
                available: previous_stock,
            });
        }
        previous_stock - quantity
    };
    product.stock = new_stock;
    product.updated_at = now;

    Ok(StockMovement {
        id: Uuid::new_v4(),
        product_id: product.id.clone(),
        kind,
        reason: reason.into(),
        quantity,
        previous_stock,
        new_stock,
        document_number: None,
        supplier_id: None,
        recorded_by,
        recorded_at: now,
        notes: String::new(),
    })
}

/// Alert level for the product's current stock, if any.
///
/// Thresholds: zero stock is out-of-stock, at or below half the minimum
/// (rounded up) is critical, at or below the minimum is low.
pub fn evaluate_stock_alert(product: &Product) -> Option<AlertKind> {
    if product.stock == 0 {
        return Some(AlertKind::OutOfStock);
    }
    if product.stock <= product.minimum_stock.div_ceil(2) {
        return Some(AlertKind::CriticalStock);
    }
    if product.stock <= product.minimum_stock {
        return Some(AlertKind::LowStock);
    }
    None
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::domain::category::CategoryId;
    use crate::domain::product::{Product, ProductId, SteelType};
    use crate::errors::DomainError;

    use super::{apply_movement, evaluate_stock_alert, AlertKind, MovementKind};

    fn product(stock: u32, minimum_stock: u32) -> Product {
        Product {
            id: ProductId(Uuid::new_v4()),
            sku: "EST-H-200".to_string(),
            name: "Perfil H 200".to_string(),
            description: String::new(),
            category_id: CategoryId(Uuid::new_v4()),
            steel_type: SteelType::Structural,
            thickness_mm: None,
            width_mm: None,
            length_mm: None,
            weight_per_meter: None,
            unit_price: Decimal::new(4_500_000, 2),
            price_per_meter: None,
            price_per_kg: None,
            stock,
            minimum_stock,
            unit_of_measure: "unidad".to_string(),
            image: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn movement_records_previous_and_new_stock() {
        let mut product = product(10, 5);
        let movement = apply_movement(
            &mut product,
            MovementKind::Outbound,
            "sale",
            3,
            Uuid::new_v4(),
            Utc::now(),
        )
        .expect("outbound");

        assert_eq!(movement.previous_stock, 10);
        assert_eq!(movement.new_stock, 7);
        assert_eq!(product.stock, 7);
    }

    #[test]
    fn outbound_beyond_available_stock_fails() {
        let mut product = product(2, 5);
        let error = apply_movement(
            &mut product,
            MovementKind::Outbound,
            "sale",
            3,
            Uuid::new_v4(),
            Utc::now(),
        )
        .expect_err("insufficient");

        assert!(matches!(error, DomainError::InsufficientStock { requested: 3, available: 2, .. }));
        assert_eq!(product.stock, 2);
    }

    #[test]
    fn returns_add_stock_back() {
        let mut product = product(2, 5);
        apply_movement(
            &mut product,
            MovementKind::Return,
            "customer_return",
            4,
            Uuid::new_v4(),
            Utc::now(),
        )
        .expect("return");
        assert_eq!(product.stock, 6);
    }

    #[test]
    fn alert_thresholds_escalate_as_stock_drops() {
        assert_eq!(evaluate_stock_alert(&product(11, 10)), None);
        assert_eq!(evaluate_stock_alert(&product(10, 10)), Some(AlertKind::LowStock));
        assert_eq!(evaluate_stock_alert(&product(5, 10)), Some(AlertKind::CriticalStock));
        assert_eq!(evaluate_stock_alert(&product(0, 10)), Some(AlertKind::OutOfStock));
    }
}
