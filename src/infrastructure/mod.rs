pub mod batch_repo;
pub mod memory;
pub mod models;
pub mod unit_of_work;

pub use memory::{InMemoryBatchRepository, InMemoryUnitOfWorkFactory};
pub use unit_of_work::DieselUnitOfWorkFactory;
