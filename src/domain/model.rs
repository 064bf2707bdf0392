use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;

use super::errors::DomainError;

/// A request to fulfil `quantity` units of `sku` for an order.
///
/// Value object: two lines with the same three fields are the same line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderLine {
    pub order_id: String,
    pub sku: String,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(order_id: impl Into<String>, sku: impl Into<String>, quantity: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            quantity,
        }
    }
}

/// A tranche of stock for one sku, either on hand (`eta == None`) or arriving
/// on `eta`.
///
/// Identity is the `reference`; equality and hashing ignore everything else.
#[derive(Debug, Clone)]
pub struct Batch {
    reference: String,
    sku: String,
    purchased_quantity: u32,
    eta: Option<NaiveDate>,
    allocations: HashSet<OrderLine>,
}

impl Batch {
    pub fn new(
        reference: impl Into<String>,
        sku: impl Into<String>,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            purchased_quantity,
            eta,
            allocations: HashSet::new(),
        }
    }

    /// Rebuild a batch from storage. Rejects rows whose allocations exceed
    /// the purchased quantity.
    pub(crate) fn from_parts(
        reference: String,
        sku: String,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
        allocations: HashSet<OrderLine>,
    ) -> Result<Self, DomainError> {
        let batch = Self {
            reference,
            sku,
            purchased_quantity,
            eta,
            allocations,
        };
        if batch.allocated_quantity() > batch.purchased_quantity {
            return Err(DomainError::Storage(format!(
                "batch {} is over-allocated: {} of {}",
                batch.reference,
                batch.allocated_quantity(),
                batch.purchased_quantity
            )));
        }
        Ok(batch)
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn purchased_quantity(&self) -> u32 {
        self.purchased_quantity
    }

    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    pub fn allocations(&self) -> &HashSet<OrderLine> {
        &self.allocations
    }

    pub fn allocated_quantity(&self) -> u32 {
        self.allocations.iter().map(|line| line.quantity).sum()
    }

    pub fn available_quantity(&self) -> u32 {
        let allocated = self.allocated_quantity();
        debug_assert!(
            allocated <= self.purchased_quantity,
            "batch {} over-allocated",
            self.reference
        );
        self.purchased_quantity.saturating_sub(allocated)
    }

    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        self.sku == line.sku && self.available_quantity() >= line.quantity
    }

    /// Add `line` to this batch if it fits. Allocating a line that is already
    /// held is a no-op.
    pub fn allocate(&mut self, line: OrderLine) {
        if self.can_allocate(&line) {
            self.allocations.insert(line);
        }
    }

    pub fn deallocate(&mut self, line: &OrderLine) {
        self.allocations.remove(line);
    }

    /// Allocation preference: in-stock batches first (`None < Some`), then
    /// earliest eta. The reference breaks ties between equal etas.
    pub fn allocation_key(&self) -> (Option<NaiveDate>, &str) {
        (self.eta, &self.reference)
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Batch {}

impl Hash for Batch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}

/// Allocate `line` to the most preferred batch that can take it and return
/// that batch's reference.
///
/// A line already held by one of the batches stays where it is. Batches of
/// other skus are never chosen. Fails with [`DomainError::OutOfStock`] when no
/// batch has room, leaving every batch untouched.
pub fn allocate<'a, I>(line: &OrderLine, batches: I) -> Result<String, DomainError>
where
    I: IntoIterator<Item = &'a mut Batch>,
{
    let mut candidates: Vec<&mut Batch> = batches.into_iter().collect();
    if let Some(holder) = candidates.iter().find(|batch| batch.allocations.contains(line)) {
        return Ok(holder.reference.clone());
    }

    candidates.sort_by(|a, b| a.allocation_key().cmp(&b.allocation_key()));

    let batch = candidates
        .into_iter()
        .find(|batch| batch.can_allocate(line))
        .ok_or_else(|| DomainError::OutOfStock(line.sku.clone()))?;

    batch.allocate(line.clone());
    Ok(batch.reference.clone())
}
