use std::sync::Arc;

use chrono::NaiveDate;

use super::unit_of_work::in_unit_of_work;
use crate::domain::errors::DomainError;
use crate::domain::model::{self, Batch, OrderLine};
use crate::domain::ports::UnitOfWorkFactory;

#[derive(Clone)]
pub struct AllocationService {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
}

impl AllocationService {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow_factory }
    }

    pub fn add_batch(
        &self,
        reference: &str,
        sku: &str,
        quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Result<(), DomainError> {
        in_unit_of_work(self.uow_factory.as_ref(), |uow| {
            uow.batches()
                .add(Batch::new(reference, sku, quantity, eta))?;
            uow.commit()
        })?;

        log::info!("Added batch {} ({} x {})", reference, quantity, sku);
        Ok(())
    }

    /// Allocate an order line and return the chosen batch reference.
    ///
    /// Fails with [`DomainError::InvalidSku`] before allocating when no batch
    /// carries `sku`, and with [`DomainError::OutOfStock`] when none has room.
    /// Nothing is committed on failure.
    pub fn allocate(&self, order_id: &str, sku: &str, quantity: u32) -> Result<String, DomainError> {
        let line = OrderLine::new(order_id, sku, quantity);

        let batchref = in_unit_of_work(self.uow_factory.as_ref(), |uow| {
            let batches = uow.batches().list_by_sku(&line.sku)?;
            if batches.is_empty() {
                return Err(DomainError::InvalidSku(line.sku.clone()));
            }

            let batchref = model::allocate(&line, batches)?;
            uow.commit()?;
            Ok(batchref)
        })?;

        log::info!(
            "Allocated order {} ({} x {}) to batch {}",
            line.order_id,
            line.quantity,
            line.sku,
            batchref
        );
        Ok(batchref)
    }

    pub fn get_batch(&self, reference: &str) -> Result<Batch, DomainError> {
        in_unit_of_work(self.uow_factory.as_ref(), |uow| {
            Ok(uow.batches().get(reference)?.clone())
        })
    }
}
