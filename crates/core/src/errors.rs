use thiserror::Error;

use crate::domain::product::ProductId;
use crate::domain::quotation::{LineId, QuotationId, QuotationStatus};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("operation `{operation}` is not permitted while quotation is {status:?}")]
    InvalidState { status: QuotationStatus, operation: &'static str },
    #[error("invalid quotation transition from {from:?} to {to:?}")]
    InvalidTransition { from: QuotationStatus, to: QuotationStatus },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("product {id} not found")]
    ProductNotFound { id: ProductId },
    #[error("product {id} is inactive and cannot be quoted")]
    InactiveProduct { id: ProductId },
    #[error("quotation line {id} not found")]
    LineNotFound { id: LineId },
    #[error("quotation {id} has no lines and cannot be finalized")]
    EmptyQuotation { id: QuotationId },
    #[error("insufficient stock for product {id}: requested {requested}, available {available}")]
    InsufficientStock { id: ProductId, requested: u32, available: u32 },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Whether the failure is the caller's fault (as opposed to ours or an
    /// upstream service's).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Domain(_))
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::quotation::QuotationStatus;

    use super::{ApplicationError, DomainError};

    #[test]
    fn domain_errors_are_client_errors() {
        let error = ApplicationError::from(DomainError::InvalidState {
            status: QuotationStatus::Finalized,
            operation: "add_line",
        });
        assert!(error.is_client_error());
    }

    #[test]
    fn infrastructure_errors_are_not_client_errors() {
        assert!(!ApplicationError::Persistence("database lock timeout".to_owned())
            .is_client_error());
        assert!(!ApplicationError::Integration("payment provider 502".to_owned())
            .is_client_error());
    }

    #[test]
    fn invalid_state_message_names_the_operation() {
        let message = DomainError::InvalidState {
            status: QuotationStatus::Paid,
            operation: "set_quantity",
        }
        .to_string();
        assert!(message.contains("set_quantity"));
        assert!(message.contains("Paid"));
    }
}
