use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::pg::PgConnection;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::ports::{BatchRepository, UnitOfWork, UnitOfWorkFactory, UnitOfWorkState};

use super::batch_repo::DieselBatchRepository;

type Transactions = AnsiTransactionManager;

/// A pooled connection with an open transaction for its whole lifetime.
pub struct DieselUnitOfWork {
    batches: DieselBatchRepository,
    state: UnitOfWorkState,
}

impl UnitOfWork for DieselUnitOfWork {
    fn batches(&mut self) -> &mut dyn BatchRepository {
        &mut self.batches
    }

    fn commit(&mut self) -> Result<(), DomainError> {
        if self.state != UnitOfWorkState::Open {
            return Err(DomainError::UnitOfWorkClosed);
        }

        self.batches.flush()?;
        let conn = self.batches.connection();
        if let Err(e) = <Transactions as TransactionManager<PgConnection>>::commit_transaction(conn) {
            // a failed COMMIT leaves nothing to keep; make sure the session is clean
            let _ = <Transactions as TransactionManager<PgConnection>>::rollback_transaction(conn);
            self.batches.discard();
            self.state = UnitOfWorkState::RolledBack;
            return Err(e.into());
        }

        self.state = UnitOfWorkState::Committed;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DomainError> {
        if self.state != UnitOfWorkState::Open {
            return Ok(());
        }

        self.batches.discard();
        self.state = UnitOfWorkState::RolledBack;
        <Transactions as TransactionManager<PgConnection>>::rollback_transaction(
            self.batches.connection(),
        )?;
        log::debug!("Rolled back unit of work");
        Ok(())
    }

    fn state(&self) -> UnitOfWorkState {
        self.state
    }
}

impl Drop for DieselUnitOfWork {
    fn drop(&mut self) {
        if let Err(e) = self.rollback() {
            log::warn!("Rollback of abandoned unit of work failed: {}", e);
        }
    }
}

#[derive(Clone)]
pub struct DieselUnitOfWorkFactory {
    pool: DbPool,
}

impl DieselUnitOfWorkFactory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl UnitOfWorkFactory for DieselUnitOfWorkFactory {
    fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError> {
        let mut conn = self.pool.get()?;
        <Transactions as TransactionManager<PgConnection>>::begin_transaction(&mut *conn)?;

        Ok(Box::new(DieselUnitOfWork {
            batches: DieselBatchRepository::new(conn),
            state: UnitOfWorkState::Open,
        }))
    }
}
