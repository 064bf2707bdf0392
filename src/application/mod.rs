pub mod allocation_service;
pub mod unit_of_work;

pub use allocation_service::AllocationService;
