use crate::domain::errors::DomainError;
use crate::domain::ports::{UnitOfWork, UnitOfWorkFactory};

/// Run `work` inside a fresh unit of work.
///
/// The unit of work is rolled back on every exit path unless `work` committed
/// it. A failed rollback is logged and never masks the result of `work`.
pub fn in_unit_of_work<T, F>(factory: &dyn UnitOfWorkFactory, work: F) -> Result<T, DomainError>
where
    F: FnOnce(&mut dyn UnitOfWork) -> Result<T, DomainError>,
{
    let mut uow = factory.begin()?;
    let outcome = work(uow.as_mut());

    if let Err(e) = uow.rollback() {
        log::warn!("Rollback of unit of work failed: {}", e);
    }

    outcome
}
