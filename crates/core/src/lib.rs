pub mod config;
pub mod domain;
pub mod errors;
pub mod numbering;

pub use domain::category::{Category, CategoryId};
pub use domain::customer::{Customer, CustomerId, CustomerKind};
pub use domain::inventory::{
    AlertKind, InboundReason, MovementKind, OutboundReason, StockAlert, StockMovement,
};
pub use domain::order::{Order, OrderId, OrderLine, OrderStatus, PaymentMethod};
pub use domain::product::{Product, ProductId, SteelType};
pub use domain::purchase::{Purchase, PurchaseId, PurchaseLine, PurchaseStatus};
pub use domain::quotation::{
    LineId, Quotation, QuotationId, QuotationLine, QuotationStatus, IVA_RATE,
};
pub use domain::supplier::{Supplier, SupplierId};
pub use errors::{ApplicationError, DomainError};
pub use numbering::{next_number, DocumentKind};
