use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::customer::CustomerId;
use crate::domain::product::ProductId;
use crate::domain::quotation::IVA_RATE;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "preparing" => Some(Self::Preparing),
            "ready" => Some(Self::Ready),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Card,
    Cheque,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Transfer => "transfer",
            Self::Card => "card",
            Self::Cheque => "cheque",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cash" => Some(Self::Cash),
            "transfer" => Some(Self::Transfer),
            "card" => Some(Self::Card),
            "cheque" => Some(Self::Cheque),
            _ => None,
        }
    }
}

/// One product entry within an order, with an optional per-line discount
/// expressed as a percentage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub subtotal: Decimal,
}

impl OrderLine {
    pub fn new(
        product_id: ProductId,
        quantity: u32,
        unit_price: Decimal,
        discount_percent: Decimal,
    ) -> Self {
        let mut line =
            Self { product_id, quantity, unit_price, discount_percent, subtotal: Decimal::ZERO };
        line.recompute_subtotal();
        line
    }

    pub fn recompute_subtotal(&mut self) {
        let discounted =
            self.unit_price * (Decimal::ONE - self.discount_percent / Decimal::ONE_HUNDRED);
        self.subtotal = (discounted * Decimal::from(self.quantity))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    }
}

/// A confirmed sales order placed by a registered customer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub number: String,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub lines: Vec<OrderLine>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub delivery_date: Option<NaiveDate>,
    pub notes: String,
    pub internal_notes: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Recompute the stored totals from the line set: 19% tax on the
    /// discounted subtotal, order-level discount applied before tax.
    pub fn recompute_totals(&mut self) {
        self.subtotal = self.lines.iter().map(|line| line.subtotal).sum();
        let taxable = self.subtotal - self.discount;
        self.tax =
            (taxable * IVA_RATE).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        self.total = taxable + self.tax;
    }
}
