use std::collections::{HashMap, HashSet};

use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::PgPooledConnection;
use crate::domain::errors::DomainError;
use crate::domain::model::{Batch, OrderLine};
use crate::domain::ports::BatchRepository;
use crate::schema::{allocations, batches, order_lines};

use super::models::{BatchRow, NewAllocationRow, NewBatchRow, NewOrderLineRow, OrderLineRow};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Storage(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Storage(e.to_string())
    }
}

fn to_db_quantity(quantity: u32) -> Result<i32, DomainError> {
    i32::try_from(quantity)
        .map_err(|_| DomainError::Storage(format!("quantity {} does not fit in int4", quantity)))
}

fn from_db_quantity(quantity: i32) -> Result<u32, DomainError> {
    u32::try_from(quantity)
        .map_err(|_| DomainError::Storage(format!("negative quantity {} in storage", quantity)))
}

// ── Repository ────────────────────────────────────────────────────────────────

struct TrackedBatch {
    id: Uuid,
    batch: Batch,
    /// Allocations as they stand in the database.
    persisted: HashSet<OrderLine>,
    is_new: bool,
}

/// PostgreSQL-backed repository bound to one connection and its open
/// transaction.
///
/// Every batch it loads is locked with `FOR UPDATE` and kept in an identity
/// map, so repeated lookups hand out the same `Batch`. Nothing is written
/// until [`flush`](Self::flush).
pub struct DieselBatchRepository {
    conn: PgPooledConnection,
    seen: HashMap<String, TrackedBatch>,
}

impl DieselBatchRepository {
    pub(crate) fn new(conn: PgPooledConnection) -> Self {
        Self {
            conn,
            seen: HashMap::new(),
        }
    }

    pub(crate) fn connection(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Forget every tracked batch without writing anything.
    pub(crate) fn discard(&mut self) {
        self.seen.clear();
    }

    /// Write new batches and allocation changes to the open transaction.
    pub(crate) fn flush(&mut self) -> Result<(), DomainError> {
        let conn: &mut PgConnection = &mut self.conn;

        for tracked in self.seen.values_mut() {
            if tracked.is_new {
                diesel::insert_into(batches::table)
                    .values(&NewBatchRow {
                        id: tracked.id,
                        reference: tracked.batch.reference(),
                        sku: tracked.batch.sku(),
                        purchased_quantity: to_db_quantity(tracked.batch.purchased_quantity())?,
                        eta: tracked.batch.eta(),
                    })
                    .execute(conn)?;
                tracked.is_new = false;
            }

            let current = tracked.batch.allocations();
            for line in current.difference(&tracked.persisted) {
                insert_allocation(conn, tracked.id, line)?;
            }
            for line in tracked.persisted.difference(current) {
                delete_allocation(conn, tracked.id, line)?;
            }
            tracked.persisted = current.clone();
        }

        Ok(())
    }

    fn track(&mut self, rows: Vec<BatchRow>) -> Result<(), DomainError> {
        let fresh: Vec<BatchRow> = rows
            .into_iter()
            .filter(|row| !self.seen.contains_key(&row.reference))
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = fresh.iter().map(|row| row.id).collect();
        let allocated: Vec<(Uuid, OrderLineRow)> = allocations::table
            .inner_join(order_lines::table)
            .filter(allocations::batch_id.eq_any(ids))
            .select((allocations::batch_id, OrderLineRow::as_select()))
            .load(self.connection())?;

        let mut lines_by_batch: HashMap<Uuid, HashSet<OrderLine>> = HashMap::new();
        for (batch_id, line) in allocated {
            lines_by_batch
                .entry(batch_id)
                .or_default()
                .insert(OrderLine::new(line.orderid, line.sku, from_db_quantity(line.qty)?));
        }

        for row in fresh {
            let persisted = lines_by_batch.remove(&row.id).unwrap_or_default();
            let batch = Batch::from_parts(
                row.reference.clone(),
                row.sku,
                from_db_quantity(row.purchased_quantity)?,
                row.eta,
                persisted.clone(),
            )?;
            self.seen.insert(
                row.reference,
                TrackedBatch {
                    id: row.id,
                    batch,
                    persisted,
                    is_new: false,
                },
            );
        }

        Ok(())
    }
}

fn insert_allocation(
    conn: &mut PgConnection,
    batch_id: Uuid,
    line: &OrderLine,
) -> Result<(), DomainError> {
    let orderline_id = Uuid::new_v4();
    diesel::insert_into(order_lines::table)
        .values(&NewOrderLineRow {
            id: orderline_id,
            orderid: &line.order_id,
            sku: &line.sku,
            qty: to_db_quantity(line.quantity)?,
        })
        .execute(conn)?;
    diesel::insert_into(allocations::table)
        .values(&NewAllocationRow {
            id: Uuid::new_v4(),
            orderline_id,
            batch_id,
        })
        .execute(conn)?;
    Ok(())
}

fn delete_allocation(
    conn: &mut PgConnection,
    batch_id: Uuid,
    line: &OrderLine,
) -> Result<(), DomainError> {
    let line_ids: Vec<Uuid> = allocations::table
        .inner_join(order_lines::table)
        .filter(allocations::batch_id.eq(batch_id))
        .filter(order_lines::orderid.eq(&line.order_id))
        .filter(order_lines::sku.eq(&line.sku))
        .filter(order_lines::qty.eq(to_db_quantity(line.quantity)?))
        .select(order_lines::id)
        .load(conn)?;

    diesel::delete(
        allocations::table
            .filter(allocations::batch_id.eq(batch_id))
            .filter(allocations::orderline_id.eq_any(line_ids.clone())),
    )
    .execute(conn)?;
    diesel::delete(order_lines::table.filter(order_lines::id.eq_any(line_ids))).execute(conn)?;
    Ok(())
}

impl BatchRepository for DieselBatchRepository {
    fn add(&mut self, batch: Batch) -> Result<(), DomainError> {
        let reference = batch.reference().to_string();
        let exists = self.seen.contains_key(&reference)
            || diesel::select(diesel::dsl::exists(
                batches::table.filter(batches::reference.eq(&reference)),
            ))
            .get_result::<bool>(self.connection())?;
        if exists {
            return Err(DomainError::DuplicateBatch(reference));
        }

        self.seen.insert(
            reference,
            TrackedBatch {
                id: Uuid::new_v4(),
                batch,
                persisted: HashSet::new(),
                is_new: true,
            },
        );
        Ok(())
    }

    fn get(&mut self, reference: &str) -> Result<&mut Batch, DomainError> {
        if !self.seen.contains_key(reference) {
            let rows = batches::table
                .filter(batches::reference.eq(reference))
                .select(BatchRow::as_select())
                .for_update()
                .load(self.connection())?;
            self.track(rows)?;
        }

        self.seen
            .get_mut(reference)
            .map(|tracked| &mut tracked.batch)
            .ok_or_else(|| DomainError::NotFound(reference.to_string()))
    }

    fn list(&mut self) -> Result<Vec<&mut Batch>, DomainError> {
        let rows = batches::table
            .select(BatchRow::as_select())
            .for_update()
            .load(self.connection())?;
        self.track(rows)?;

        Ok(self
            .seen
            .values_mut()
            .map(|tracked| &mut tracked.batch)
            .collect())
    }

    fn list_by_sku(&mut self, sku: &str) -> Result<Vec<&mut Batch>, DomainError> {
        let rows = batches::table
            .filter(batches::sku.eq(sku))
            .select(BatchRow::as_select())
            .for_update()
            .load(self.connection())?;
        self.track(rows)?;

        Ok(self
            .seen
            .values_mut()
            .filter(|tracked| tracked.batch.sku() == sku)
            .map(|tracked| &mut tracked.batch)
            .collect())
    }
}
