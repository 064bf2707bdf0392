use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::errors::DomainError;
use crate::domain::model::Batch;
use crate::domain::ports::{BatchRepository, UnitOfWork, UnitOfWorkFactory, UnitOfWorkState};

// ── Repository ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryBatchRepository {
    batches: BTreeMap<String, Batch>,
}

impl InMemoryBatchRepository {
    pub fn new(batches: impl IntoIterator<Item = Batch>) -> Self {
        Self {
            batches: batches
                .into_iter()
                .map(|b| (b.reference().to_string(), b))
                .collect(),
        }
    }
}

impl BatchRepository for InMemoryBatchRepository {
    fn add(&mut self, batch: Batch) -> Result<(), DomainError> {
        if self.batches.contains_key(batch.reference()) {
            return Err(DomainError::DuplicateBatch(batch.reference().to_string()));
        }
        self.batches.insert(batch.reference().to_string(), batch);
        Ok(())
    }

    fn get(&mut self, reference: &str) -> Result<&mut Batch, DomainError> {
        self.batches
            .get_mut(reference)
            .ok_or_else(|| DomainError::NotFound(reference.to_string()))
    }

    fn list(&mut self) -> Result<Vec<&mut Batch>, DomainError> {
        Ok(self.batches.values_mut().collect())
    }
}

// ── Unit of work ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Store {
    version: u64,
    batches: BTreeMap<String, Batch>,
    /// Commits that touched each sku.
    sku_revisions: HashMap<String, u64>,
}

impl Store {
    fn sku_revision(&self, sku: &str) -> u64 {
        self.sku_revisions.get(sku).copied().unwrap_or(0)
    }
}

fn lock(store: &Mutex<Store>) -> Result<MutexGuard<'_, Store>, DomainError> {
    store
        .lock()
        .map_err(|_| DomainError::Storage("in-memory store lock poisoned".to_string()))
}

fn unchanged(before: &Batch, after: &Batch) -> bool {
    before.sku() == after.sku()
        && before.purchased_quantity() == after.purchased_quantity()
        && before.eta() == after.eta()
        && before.allocations() == after.allocations()
}

/// Works on a private copy of the store. `commit` publishes the batches it
/// changed, provided no other commit touched the same skus since `begin`.
pub struct InMemoryUnitOfWork {
    store: Arc<Mutex<Store>>,
    base: BTreeMap<String, Batch>,
    base_revisions: HashMap<String, u64>,
    batches: InMemoryBatchRepository,
    state: UnitOfWorkState,
}

impl InMemoryUnitOfWork {
    fn changed_batches(&mut self) -> Vec<Batch> {
        let base = &self.base;
        std::mem::take(&mut self.batches.batches)
            .into_values()
            .filter(|batch| {
                base.get(batch.reference())
                    .map_or(true, |before| !unchanged(before, batch))
            })
            .collect()
    }
}

impl UnitOfWork for InMemoryUnitOfWork {
    fn batches(&mut self) -> &mut dyn BatchRepository {
        &mut self.batches
    }

    fn commit(&mut self) -> Result<(), DomainError> {
        if self.state != UnitOfWorkState::Open {
            return Err(DomainError::UnitOfWorkClosed);
        }

        let changed = self.changed_batches();
        let mut store = lock(&self.store)?;
        for batch in &changed {
            let seen = self.base_revisions.get(batch.sku()).copied().unwrap_or(0);
            let current = store.sku_revision(batch.sku());
            if current != seen {
                self.state = UnitOfWorkState::RolledBack;
                return Err(DomainError::Storage(format!(
                    "concurrent modification: sku {} moved from revision {} to {}",
                    batch.sku(),
                    seen,
                    current
                )));
            }
            if !self.base.contains_key(batch.reference())
                && store.batches.contains_key(batch.reference())
            {
                self.state = UnitOfWorkState::RolledBack;
                return Err(DomainError::DuplicateBatch(batch.reference().to_string()));
            }
        }

        store.version += 1;
        let version = store.version;
        for batch in changed {
            store.sku_revisions.insert(batch.sku().to_string(), version);
            store.batches.insert(batch.reference().to_string(), batch);
        }
        self.state = UnitOfWorkState::Committed;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DomainError> {
        if self.state == UnitOfWorkState::Open {
            self.batches.batches.clear();
            self.base.clear();
            self.state = UnitOfWorkState::RolledBack;
            log::debug!("Rolled back in-memory unit of work");
        }
        Ok(())
    }

    fn state(&self) -> UnitOfWorkState {
        self.state
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        let _ = self.rollback();
    }
}

/// Process-local storage, mostly for tests and `STORAGE=memory` runs.
/// Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUnitOfWorkFactory {
    store: Arc<Mutex<Store>>,
}

impl InMemoryUnitOfWorkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batches(batches: impl IntoIterator<Item = Batch>) -> Self {
        let repo = InMemoryBatchRepository::new(batches);
        Self {
            store: Arc::new(Mutex::new(Store {
                batches: repo.batches,
                ..Store::default()
            })),
        }
    }

    /// Committed batches, ordered by reference.
    pub fn snapshot(&self) -> Result<Vec<Batch>, DomainError> {
        Ok(lock(&self.store)?.batches.values().cloned().collect())
    }

    /// Number of commits so far.
    pub fn version(&self) -> Result<u64, DomainError> {
        Ok(lock(&self.store)?.version)
    }
}

impl UnitOfWorkFactory for InMemoryUnitOfWorkFactory {
    fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError> {
        let store = lock(&self.store)?;
        Ok(Box::new(InMemoryUnitOfWork {
            store: Arc::clone(&self.store),
            base: store.batches.clone(),
            base_revisions: store.sku_revisions.clone(),
            batches: InMemoryBatchRepository {
                batches: store.batches.clone(),
            },
            state: UnitOfWorkState::Open,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::OrderLine;

    #[test]
    fn repository_can_add_and_get_a_batch() {
        let mut repo = InMemoryBatchRepository::default();
        repo.add(Batch::new("batch1", "RUSTY-SOAPDISH", 100, None))
            .expect("add failed");

        let batch = repo.get("batch1").expect("get failed");

        assert_eq!(batch.sku(), "RUSTY-SOAPDISH");
        assert_eq!(batch.purchased_quantity(), 100);
    }

    #[test]
    fn repository_rejects_duplicate_reference() {
        let mut repo = InMemoryBatchRepository::new([Batch::new("batch1", "A", 1, None)]);

        let err = repo
            .add(Batch::new("batch1", "B", 2, None))
            .expect_err("duplicate should fail");

        assert!(matches!(err, DomainError::DuplicateBatch(ref r) if r == "batch1"));
        assert_eq!(repo.get("batch1").expect("get failed").sku(), "A");
    }

    #[test]
    fn repository_get_unknown_reference_is_not_found() {
        let mut repo = InMemoryBatchRepository::default();
        let err = repo.get("nope").expect_err("should be missing");
        assert!(matches!(err, DomainError::NotFound(ref r) if r == "nope"));
    }

    #[test]
    fn repository_lists_by_sku() {
        let mut repo = InMemoryBatchRepository::new([
            Batch::new("b1", "LAMP", 1, None),
            Batch::new("b2", "CHAIR", 1, None),
            Batch::new("b3", "LAMP", 1, None),
        ]);

        assert_eq!(repo.list().expect("list failed").len(), 3);
        let lamps: Vec<String> = repo
            .list_by_sku("LAMP")
            .expect("list failed")
            .into_iter()
            .map(|b| b.reference().to_string())
            .collect();
        assert_eq!(lamps, vec!["b1", "b3"]);
        assert!(repo.list_by_sku("SOFA").expect("list failed").is_empty());
    }

    #[test]
    fn uow_can_retrieve_a_batch_and_allocate_to_it() {
        let factory =
            InMemoryUnitOfWorkFactory::with_batches([Batch::new("batch1", "HIPSTER-WORKBENCH", 100, None)]);

        let mut uow = factory.begin().expect("begin failed");
        let batch = uow.batches().get("batch1").expect("get failed");
        batch.allocate(OrderLine::new("o1", "HIPSTER-WORKBENCH", 10));
        uow.commit().expect("commit failed");

        let stored = factory.snapshot().expect("snapshot failed");
        assert_eq!(stored[0].available_quantity(), 90);
        assert_eq!(uow.state(), UnitOfWorkState::Committed);
    }

    #[test]
    fn dropping_an_open_uow_discards_changes() {
        let factory = InMemoryUnitOfWorkFactory::new();

        {
            let mut uow = factory.begin().expect("begin failed");
            uow.batches()
                .add(Batch::new("b1", "MEDIUM-PLINTH", 100, None))
                .expect("add failed");
        }

        assert!(factory.snapshot().expect("snapshot failed").is_empty());
        assert_eq!(factory.version().expect("version failed"), 0);
    }

    #[test]
    fn rollback_discards_uncommitted_changes() {
        let factory = InMemoryUnitOfWorkFactory::new();
        let mut uow = factory.begin().expect("begin failed");
        uow.batches()
            .add(Batch::new("b1", "MEDIUM-PLINTH", 100, None))
            .expect("add failed");

        uow.rollback().expect("rollback failed");

        assert_eq!(uow.state(), UnitOfWorkState::RolledBack);
        assert!(factory.snapshot().expect("snapshot failed").is_empty());
        assert!(matches!(uow.commit(), Err(DomainError::UnitOfWorkClosed)));
    }

    #[test]
    fn rollback_after_commit_has_no_effect() {
        let factory = InMemoryUnitOfWorkFactory::new();
        let mut uow = factory.begin().expect("begin failed");
        uow.batches()
            .add(Batch::new("b1", "MEDIUM-PLINTH", 100, None))
            .expect("add failed");
        uow.commit().expect("commit failed");

        uow.rollback().expect("rollback failed");

        assert_eq!(uow.state(), UnitOfWorkState::Committed);
        assert_eq!(factory.snapshot().expect("snapshot failed").len(), 1);
    }

    #[test]
    fn second_commit_is_rejected() {
        let factory = InMemoryUnitOfWorkFactory::new();
        let mut uow = factory.begin().expect("begin failed");
        uow.commit().expect("commit failed");

        assert!(matches!(uow.commit(), Err(DomainError::UnitOfWorkClosed)));
    }

    #[test]
    fn concurrent_commit_is_rejected() {
        let factory = InMemoryUnitOfWorkFactory::with_batches([Batch::new("b1", "LAMP", 10, None)]);
        let mut first = factory.begin().expect("begin failed");
        let mut second = factory.begin().expect("begin failed");

        first
            .batches()
            .get("b1")
            .expect("get failed")
            .allocate(OrderLine::new("o1", "LAMP", 10));
        second
            .batches()
            .get("b1")
            .expect("get failed")
            .allocate(OrderLine::new("o2", "LAMP", 10));
        first.commit().expect("first commit failed");

        let err = second.commit().expect_err("second commit should conflict");

        assert!(matches!(err, DomainError::Storage(_)));
        let stored = factory.snapshot().expect("snapshot failed");
        assert_eq!(stored[0].allocated_quantity(), 10);
        assert!(stored[0]
            .allocations()
            .contains(&OrderLine::new("o1", "LAMP", 10)));
    }

    #[test]
    fn commits_on_different_skus_do_not_conflict() {
        let factory = InMemoryUnitOfWorkFactory::new();
        let mut first = factory.begin().expect("begin failed");
        let mut second = factory.begin().expect("begin failed");

        first
            .batches()
            .add(Batch::new("x", "SKU-X", 10, None))
            .expect("add failed");
        second
            .batches()
            .add(Batch::new("y", "SKU-Y", 10, None))
            .expect("add failed");
        first.commit().expect("first commit failed");
        second.commit().expect("second commit failed");

        let refs: Vec<String> = factory
            .snapshot()
            .expect("snapshot failed")
            .iter()
            .map(|b| b.reference().to_string())
            .collect();
        assert_eq!(refs, vec!["x", "y"]);
        assert_eq!(factory.version().expect("version failed"), 2);
    }

    #[test]
    fn commit_keeps_batches_it_did_not_change() {
        let factory = InMemoryUnitOfWorkFactory::with_batches([
            Batch::new("lamp", "LAMP", 10, None),
            Batch::new("sofa", "SOFA", 10, None),
        ]);
        let mut reader = factory.begin().expect("begin failed");
        let mut writer = factory.begin().expect("begin failed");

        writer
            .batches()
            .get("sofa")
            .expect("get failed")
            .allocate(OrderLine::new("o1", "SOFA", 3));
        writer.commit().expect("writer commit failed");
        reader
            .batches()
            .get("lamp")
            .expect("get failed")
            .allocate(OrderLine::new("o2", "LAMP", 4));
        reader.commit().expect("reader commit failed");

        let stored = factory.snapshot().expect("snapshot failed");
        assert_eq!(stored[0].available_quantity(), 6);
        assert_eq!(stored[1].available_quantity(), 7);
    }

    #[test]
    fn concurrent_adds_of_the_same_reference_conflict() {
        let factory = InMemoryUnitOfWorkFactory::new();
        let mut first = factory.begin().expect("begin failed");
        let mut second = factory.begin().expect("begin failed");

        first
            .batches()
            .add(Batch::new("b1", "LAMP", 10, None))
            .expect("add failed");
        second
            .batches()
            .add(Batch::new("b1", "SOFA", 5, None))
            .expect("add failed");
        first.commit().expect("first commit failed");

        let err = second.commit().expect_err("second commit should conflict");

        assert!(matches!(err, DomainError::DuplicateBatch(ref r) if r == "b1"));
        assert_eq!(factory.snapshot().expect("snapshot failed")[0].sku(), "LAMP");
    }
}
