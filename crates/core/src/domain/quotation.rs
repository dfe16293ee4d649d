use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::product::{Product, ProductId};
use crate::errors::DomainError;

/// Chilean VAT applied to every quotation subtotal.
pub const IVA_RATE: Decimal = Decimal::from_parts(19, 0, 0, false, 2);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub Uuid);

impl std::fmt::Display for QuotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineId(pub Uuid);

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Finalized,
    Paid,
    Cancelled,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Finalized => "finalized",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "finalized" => Some(Self::Finalized),
            "paid" => Some(Self::Paid),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// One product entry within a quotation. The unit price is snapshotted when
/// the line is first added and never follows later catalog price changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuotationLine {
    pub id: LineId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl QuotationLine {
    fn recompute_subtotal(&mut self) {
        self.subtotal = self.unit_price * Decimal::from(self.quantity);
    }
}

/// A customer quotation.
///
/// Lines may only be mutated while the quotation is in `Draft`; every line
/// mutation recomputes the stored totals so that
/// `total == subtotal + round(subtotal * 0.19, 2)` holds whenever the
/// quotation is persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub number: String,
    pub owner_id: Uuid,
    pub status: QuotationStatus,
    pub lines: Vec<QuotationLine>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub mercadopago_preference_id: Option<String>,
    pub mercadopago_payment_id: Option<String>,
}

impl Quotation {
    pub fn new(number: String, owner_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: QuotationId(Uuid::new_v4()),
            number,
            owner_id,
            status: QuotationStatus::Draft,
            lines: Vec::new(),
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::ZERO,
            notes: String::new(),
            created_at: now,
            updated_at: now,
            finalized_at: None,
            mercadopago_preference_id: None,
            mercadopago_payment_id: None,
        }
    }

    pub fn can_transition_to(&self, next: QuotationStatus) -> bool {
        matches!(
            (self.status, next),
            (QuotationStatus::Draft, QuotationStatus::Finalized)
                | (QuotationStatus::Finalized, QuotationStatus::Paid)
                | (QuotationStatus::Paid, QuotationStatus::Paid)
                | (QuotationStatus::Draft, QuotationStatus::Cancelled)
                | (QuotationStatus::Finalized, QuotationStatus::Cancelled)
        )
    }

    fn ensure_draft(&self, operation: &'static str) -> Result<(), DomainError> {
        if self.status != QuotationStatus::Draft {
            return Err(DomainError::InvalidState { status: self.status, operation });
        }
        Ok(())
    }

    /// Add `quantity` of `product` to the quotation.
    ///
    /// A quotation carries at most one line per product: adding a product
    /// that is already quoted increments the existing line and keeps its
    /// originally snapshotted unit price.
    pub fn add_or_increment(
        &mut self,
        product: &Product,
        quantity: u32,
    ) -> Result<LineId, DomainError> {
        self.ensure_draft("add_or_increment")?;
        if quantity == 0 {
            return Err(DomainError::InvalidArgument(
                "quantity must be greater than zero".to_string(),
            ));
        }
        if !product.active {
            return Err(DomainError::InactiveProduct { id: product.id.clone() });
        }

        let line_id = match self.lines.iter_mut().find(|line| line.product_id == product.id) {
            Some(line) => {
                line.quantity += quantity;
                line.recompute_subtotal();
                line.id.clone()
            }
            None => {
                let mut line = QuotationLine {
                    id: LineId(Uuid::new_v4()),
                    product_id: product.id.clone(),
                    quantity,
                    unit_price: product.unit_price,
                    subtotal: Decimal::ZERO,
                };
                line.recompute_subtotal();
                let id = line.id.clone();
                self.lines.push(line);
                id
            }
        };

        self.recompute_totals();
        Ok(line_id)
    }

    pub fn set_quantity(&mut self, line_id: &LineId, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidArgument(
                "quantity must be greater than zero".to_string(),
            ));
        }
        self.ensure_draft("set_quantity")?;

        let line = self
            .lines
            .iter_mut()
            .find(|line| &line.id == line_id)
            .ok_or_else(|| DomainError::LineNotFound { id: line_id.clone() })?;
        line.quantity = quantity;
        line.recompute_subtotal();

        self.recompute_totals();
        Ok(())
    }

    pub fn remove_line(&mut self, line_id: &LineId) -> Result<(), DomainError> {
        self.ensure_draft("remove_line")?;

        let position = self
            .lines
            .iter()
            .position(|line| &line.id == line_id)
            .ok_or_else(|| DomainError::LineNotFound { id: line_id.clone() })?;
        self.lines.remove(position);

        self.recompute_totals();
        Ok(())
    }

    /// Recompute subtotal, tax, and total from the current line set.
    ///
    /// Pure function of the lines; calling it twice with no intervening
    /// line mutation yields identical values.
    pub fn recompute_totals(&mut self) {
        self.subtotal = self.lines.iter().map(|line| line.subtotal).sum();
        self.tax = (self.subtotal * IVA_RATE)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        self.total = self.subtotal + self.tax;
    }

    /// Lock the line set and hand the quotation off to payment selection.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_draft("finalize")?;
        if self.lines.is_empty() {
            return Err(DomainError::EmptyQuotation { id: self.id.clone() });
        }

        self.status = QuotationStatus::Finalized;
        self.finalized_at = Some(now);
        Ok(())
    }

    /// Record a completed payment. Re-entry on an already paid quotation is
    /// allowed because provider callbacks can be delivered more than once.
    pub fn mark_paid(&mut self, payment_id: Option<String>) -> Result<(), DomainError> {
        if !self.can_transition_to(QuotationStatus::Paid) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: QuotationStatus::Paid,
            });
        }

        self.status = QuotationStatus::Paid;
        if let Some(payment_id) = payment_id {
            self.mercadopago_payment_id = Some(payment_id);
        }
        Ok(())
    }

    /// Cancellation is terminal and only reachable before payment.
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if !self.can_transition_to(QuotationStatus::Cancelled) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: QuotationStatus::Cancelled,
            });
        }

        self.status = QuotationStatus::Cancelled;
        Ok(())
    }

    pub fn line(&self, line_id: &LineId) -> Option<&QuotationLine> {
        self.lines.iter().find(|line| &line.id == line_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::domain::category::CategoryId;
    use crate::domain::product::{Product, ProductId, SteelType};
    use crate::errors::DomainError;

    use super::{Quotation, QuotationStatus};

    fn product(unit_price: Decimal, active: bool) -> Product {
        Product {
            id: ProductId(Uuid::new_v4()),
            sku: "GAL-PL-3".to_string(),
            name: "Plancha galvanizada 3mm".to_string(),
            description: String::new(),
            category_id: CategoryId(Uuid::new_v4()),
            steel_type: SteelType::Galvanized,
            thickness_mm: Some(Decimal::new(300, 2)),
            width_mm: None,
            length_mm: None,
            weight_per_meter: None,
            unit_price,
            price_per_meter: None,
            price_per_kg: None,
            stock: 40,
            minimum_stock: 5,
            unit_of_measure: "unidad".to_string(),
            image: None,
            active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn draft() -> Quotation {
        Quotation::new("COT202508290001".to_string(), Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn repeated_adds_merge_into_a_single_line() {
        let product = product(Decimal::new(100_000, 2), true);
        let mut quotation = draft();

        quotation.add_or_increment(&product, 2).expect("first add");
        quotation.add_or_increment(&product, 3).expect("second add");

        assert_eq!(quotation.lines.len(), 1);
        assert_eq!(quotation.lines[0].quantity, 5);
        assert_eq!(quotation.lines[0].subtotal, Decimal::new(500_000, 2));
        assert_eq!(quotation.subtotal, Decimal::new(500_000, 2));
        assert_eq!(quotation.tax, Decimal::new(95_000, 2));
        assert_eq!(quotation.total, Decimal::new(595_000, 2));
    }

    #[test]
    fn incrementing_keeps_the_snapshotted_unit_price() {
        let mut product = product(Decimal::new(100_000, 2), true);
        let mut quotation = draft();

        quotation.add_or_increment(&product, 1).expect("add");
        product.unit_price = Decimal::new(999_900, 2);
        quotation.add_or_increment(&product, 1).expect("increment after price change");

        assert_eq!(quotation.lines[0].unit_price, Decimal::new(100_000, 2));
        assert_eq!(quotation.subtotal, Decimal::new(200_000, 2));
    }

    #[test]
    fn inactive_products_cannot_be_added() {
        let product = product(Decimal::new(100_000, 2), false);
        let mut quotation = draft();

        let error = quotation.add_or_increment(&product, 1).expect_err("inactive");
        assert!(matches!(error, DomainError::InactiveProduct { .. }));
        assert!(quotation.lines.is_empty());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let product = product(Decimal::new(100_000, 2), true);
        let mut quotation = draft();

        let add = quotation.add_or_increment(&product, 0).expect_err("zero add");
        assert!(matches!(add, DomainError::InvalidArgument(_)));

        let line_id = quotation.add_or_increment(&product, 2).expect("add");
        let update = quotation.set_quantity(&line_id, 0).expect_err("zero update");
        assert!(matches!(update, DomainError::InvalidArgument(_)));
        assert_eq!(quotation.lines[0].quantity, 2);
    }

    #[test]
    fn recompute_totals_is_idempotent() {
        let product = product(Decimal::new(333_333, 2), true);
        let mut quotation = draft();
        quotation.add_or_increment(&product, 3).expect("add");

        let first = (quotation.subtotal, quotation.tax, quotation.total);
        quotation.recompute_totals();
        let second = (quotation.subtotal, quotation.tax, quotation.total);

        assert_eq!(first, second);
        assert_eq!(quotation.total, quotation.subtotal + quotation.tax);
    }

    #[test]
    fn tax_rounds_half_up_to_two_decimals() {
        // 50.01 * 0.19 = 9.5019 -> 9.50; 50.50 * 0.19 = 9.595 -> 9.60
        let mut quotation = draft();
        quotation.add_or_increment(&product(Decimal::new(5_001, 2), true), 1).expect("add");
        assert_eq!(quotation.tax, Decimal::new(950, 2));

        let mut quotation = draft();
        quotation.add_or_increment(&product(Decimal::new(5_050, 2), true), 1).expect("add");
        assert_eq!(quotation.tax, Decimal::new(960, 2));
    }

    #[test]
    fn finalize_requires_at_least_one_line() {
        let mut quotation = draft();
        let error = quotation.finalize(Utc::now()).expect_err("empty finalize");

        assert!(matches!(error, DomainError::EmptyQuotation { .. }));
        assert_eq!(quotation.status, QuotationStatus::Draft);
        assert!(quotation.finalized_at.is_none());
    }

    #[test]
    fn finalize_stamps_timestamp_and_locks_lines() {
        let product = product(Decimal::new(100_000, 2), true);
        let mut quotation = draft();
        let line_id = quotation.add_or_increment(&product, 2).expect("add");

        quotation.finalize(Utc::now()).expect("finalize");
        assert_eq!(quotation.status, QuotationStatus::Finalized);
        assert!(quotation.finalized_at.is_some());

        let add = quotation.add_or_increment(&product, 1).expect_err("add after finalize");
        assert!(matches!(add, DomainError::InvalidState { .. }));
        let update = quotation.set_quantity(&line_id, 9).expect_err("update after finalize");
        assert!(matches!(update, DomainError::InvalidState { .. }));
        let remove = quotation.remove_line(&line_id).expect_err("remove after finalize");
        assert!(matches!(remove, DomainError::InvalidState { .. }));

        assert_eq!(quotation.lines[0].quantity, 2);
    }

    #[test]
    fn draft_cannot_be_marked_paid_directly() {
        let mut quotation = draft();
        let error = quotation.mark_paid(None).expect_err("draft -> paid");
        assert!(matches!(error, DomainError::InvalidTransition { .. }));
        assert_eq!(quotation.status, QuotationStatus::Draft);
    }

    #[test]
    fn mark_paid_is_idempotent_and_records_payment_id() {
        let product = product(Decimal::new(100_000, 2), true);
        let mut quotation = draft();
        quotation.add_or_increment(&product, 1).expect("add");
        quotation.finalize(Utc::now()).expect("finalize");

        quotation.mark_paid(Some("mp-12345".to_string())).expect("first callback");
        quotation.mark_paid(None).expect("duplicate callback");

        assert_eq!(quotation.status, QuotationStatus::Paid);
        assert_eq!(quotation.mercadopago_payment_id.as_deref(), Some("mp-12345"));
    }

    #[test]
    fn cancellation_is_terminal() {
        let product = product(Decimal::new(100_000, 2), true);
        let mut quotation = draft();
        quotation.add_or_increment(&product, 1).expect("add");
        quotation.cancel().expect("cancel draft");

        assert_eq!(quotation.status, QuotationStatus::Cancelled);
        assert!(quotation.mark_paid(None).is_err());
        assert!(quotation.finalize(Utc::now()).is_err());
        assert!(quotation.cancel().is_err());
    }
}
