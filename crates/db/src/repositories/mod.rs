use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use pozinox_core::domain::category::{Category, CategoryId};
use pozinox_core::domain::customer::{Customer, CustomerId};
use pozinox_core::domain::inventory::{StockAlert, StockMovement};
use pozinox_core::domain::order::{Order, OrderId};
use pozinox_core::domain::product::{Product, ProductId, SteelType};
use pozinox_core::domain::purchase::{Purchase, PurchaseId};
use pozinox_core::domain::quotation::{Quotation, QuotationId};
use pozinox_core::domain::supplier::{Supplier, SupplierId};

pub mod catalog;
pub mod customer;
pub(crate) mod decode;
pub mod inventory;
pub mod memory;
pub mod order;
pub mod purchase;
pub mod quotation;
pub mod supplier;

pub use catalog::{SqlCategoryRepository, SqlProductRepository};
pub use customer::SqlCustomerRepository;
pub use inventory::SqlInventoryRepository;
pub use memory::{InMemoryProductRepository, InMemoryQuotationRepository};
pub use order::SqlOrderRepository;
pub use purchase::SqlPurchaseRepository;
pub use quotation::SqlQuotationRepository;
pub use supplier::SqlSupplierRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Catalog listing filter. All fields are optional and combine with AND.
#[derive(Clone, Debug, Default)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    pub steel_type: Option<SteelType>,
    pub search: Option<String>,
    pub include_inactive: bool,
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn find_by_id(&self, id: &CategoryId) -> Result<Option<Category>, RepositoryError>;
    async fn list(&self, include_inactive: bool) -> Result<Vec<Category>, RepositoryError>;
    async fn save(&self, category: Category) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError>;
    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError>;
    async fn list_low_stock(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn save(&self, product: Product) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, RepositoryError>;
    async fn list(&self, include_inactive: bool) -> Result<Vec<Customer>, RepositoryError>;
    async fn save(&self, customer: Customer) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait QuotationRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError>;
    async fn find_by_number(&self, number: &str) -> Result<Option<Quotation>, RepositoryError>;

    /// The single open draft for an owner, if one exists.
    async fn find_draft_for_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Option<Quotation>, RepositoryError>;

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Quotation>, RepositoryError>;

    /// Persist a new quotation, assigning its sequential document number.
    /// Returns the stored quotation with the number filled in.
    async fn create(&self, quotation: Quotation) -> Result<Quotation, RepositoryError>;

    /// Upsert the header and replace the line set atomically.
    async fn save(&self, quotation: &Quotation) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Order>, RepositoryError>;
    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Persist a new order, assigning its sequential document number.
    async fn create(&self, order: Order) -> Result<Order, RepositoryError>;

    async fn save(&self, order: &Order) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SupplierRepository: Send + Sync {
    async fn find_by_id(&self, id: &SupplierId) -> Result<Option<Supplier>, RepositoryError>;
    async fn list(&self, include_inactive: bool) -> Result<Vec<Supplier>, RepositoryError>;
    async fn save(&self, supplier: Supplier) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    async fn find_by_id(&self, id: &PurchaseId) -> Result<Option<Purchase>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Purchase>, RepositoryError>;

    /// Persist a new purchase, assigning its sequential document number.
    async fn create(&self, purchase: Purchase) -> Result<Purchase, RepositoryError>;

    async fn save(&self, purchase: &Purchase) -> Result<(), RepositoryError>;

    /// Atomically persist a receipt: the purchase header and lines, the
    /// product's stock counter, and the inbound movement, in one
    /// transaction.
    async fn record_receipt(
        &self,
        purchase: &Purchase,
        product: &Product,
        movement: &StockMovement,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Atomically persist a movement: the product's stock counter, the
    /// audit row, and the alert when one fired, in one transaction.
    async fn apply(
        &self,
        product: &Product,
        movement: &StockMovement,
        alert: Option<&StockAlert>,
    ) -> Result<(), RepositoryError>;

    async fn record_movement(&self, movement: StockMovement) -> Result<(), RepositoryError>;
    async fn list_movements_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<StockMovement>, RepositoryError>;

    async fn save_alert(&self, alert: StockAlert) -> Result<(), RepositoryError>;
    async fn list_open_alerts(&self) -> Result<Vec<StockAlert>, RepositoryError>;
    async fn acknowledge_alert(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

/// Bounded retry count for document-number allocation. The count-based
/// sequence can collide when two writers allocate the same day's next
/// number concurrently; the unique index rejects the loser, which
/// re-counts and retries.
pub(crate) const NUMBER_ALLOCATION_ATTEMPTS: usize = 3;

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_error) if db_error.is_unique_violation()
    )
}

/// Same-day sequence position: rows whose RFC 3339 `created_at` starts
/// with the given date.
pub(crate) fn date_prefix(date: NaiveDate) -> String {
    format!("{}%", date.format("%Y-%m-%d"))
}
