use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::product::ProductId;
use crate::domain::quotation::IVA_RATE;
use crate::domain::supplier::SupplierId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurchaseId(pub Uuid);

impl std::fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Ordered,
    PartiallyReceived,
    Received,
    Invoiced,
    Paid,
    Cancelled,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ordered => "ordered",
            Self::PartiallyReceived => "partially_received",
            Self::Received => "received",
            Self::Invoiced => "invoiced",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "ordered" => Some(Self::Ordered),
            "partially_received" => Some(Self::PartiallyReceived),
            "received" => Some(Self::Received),
            "invoiced" => Some(Self::Invoiced),
            "paid" => Some(Self::Paid),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub product_id: ProductId,
    pub quantity_ordered: u32,
    pub quantity_received: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl PurchaseLine {
    pub fn new(product_id: ProductId, quantity_ordered: u32, unit_price: Decimal) -> Self {
        let subtotal = unit_price * Decimal::from(quantity_ordered);
        Self { product_id, quantity_ordered, quantity_received: 0, unit_price, subtotal }
    }
}

/// A restocking order placed with a supplier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub number: String,
    pub supplier_id: SupplierId,
    pub status: PurchaseStatus,
    pub expected_date: NaiveDate,
    pub received_date: Option<NaiveDate>,
    pub lines: Vec<PurchaseLine>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub created_by: Uuid,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    pub fn recompute_totals(&mut self) {
        self.subtotal = self.lines.iter().map(|line| line.subtotal).sum();
        self.tax = (self.subtotal * IVA_RATE)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        self.total = self.subtotal + self.tax;
    }

    /// Record `quantity` units of `product_id` arriving from the supplier.
    ///
    /// Receipts accumulate per line; the purchase status tracks whether the
    /// full order has arrived. Over-receiving beyond the ordered quantity is
    /// rejected so inventory stays reconcilable against the order.
    pub fn receive(
        &mut self,
        product_id: &ProductId,
        quantity: u32,
        today: NaiveDate,
    ) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidArgument(
                "received quantity must be greater than zero".to_string(),
            ));
        }
        if matches!(self.status, PurchaseStatus::Cancelled) {
            return Err(DomainError::InvalidArgument(
                "cancelled purchases cannot receive stock".to_string(),
            ));
        }

        let line = self
            .lines
            .iter_mut()
            .find(|line| &line.product_id == product_id)
            .ok_or_else(|| DomainError::ProductNotFound { id: product_id.clone() })?;

        let outstanding = line.quantity_ordered.saturating_sub(line.quantity_received);
        if quantity > outstanding {
            return Err(DomainError::InvalidArgument(format!(
                "cannot receive {quantity} units, only {outstanding} outstanding"
            )));
        }
        line.quantity_received += quantity;

        let fully_received =
            self.lines.iter().all(|line| line.quantity_received >= line.quantity_ordered);
        self.status = if fully_received {
            self.received_date = Some(today);
            PurchaseStatus::Received
        } else {
            PurchaseStatus::PartiallyReceived
        };
        Ok(())
    }
}
