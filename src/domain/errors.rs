use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Out of stock for sku {0}")]
    OutOfStock(String),
    #[error("Invalid sku {0}")]
    InvalidSku(String),
    #[error("Batch {0} not found")]
    NotFound(String),
    #[error("Batch {0} already exists")]
    DuplicateBatch(String),
    #[error("Unit of work is no longer open")]
    UnitOfWorkClosed,
    #[error("Storage error: {0}")]
    Storage(String),
}
