use super::errors::DomainError;
use super::model::Batch;

/// Storage-agnostic collection of batches.
///
/// Handles returned by `get` and `list` are tracked by the repository;
/// changes made through them are persisted when the owning unit of work
/// commits.
pub trait BatchRepository: Send {
    /// Fails with [`DomainError::DuplicateBatch`] if the reference is taken.
    fn add(&mut self, batch: Batch) -> Result<(), DomainError>;
    fn get(&mut self, reference: &str) -> Result<&mut Batch, DomainError>;
    fn list(&mut self) -> Result<Vec<&mut Batch>, DomainError>;

    fn list_by_sku(&mut self, sku: &str) -> Result<Vec<&mut Batch>, DomainError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|batch| batch.sku() == sku)
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkState {
    Open,
    Committed,
    RolledBack,
}

/// One business transaction over the batch repository.
///
/// Implementations roll back when dropped while still open.
pub trait UnitOfWork: Send {
    fn batches(&mut self) -> &mut dyn BatchRepository;
    fn commit(&mut self) -> Result<(), DomainError>;
    /// No-op unless the unit of work is still open.
    fn rollback(&mut self) -> Result<(), DomainError>;
    fn state(&self) -> UnitOfWorkState;
}

pub trait UnitOfWorkFactory: Send + Sync + 'static {
    fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError>;
}
