use chrono::NaiveDate;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::{allocations, batches, order_lines};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = batches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BatchRow {
    pub id: Uuid,
    pub reference: String,
    pub sku: String,
    pub purchased_quantity: i32,
    pub eta: Option<NaiveDate>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = batches)]
pub struct NewBatchRow<'a> {
    pub id: Uuid,
    pub reference: &'a str,
    pub sku: &'a str,
    pub purchased_quantity: i32,
    pub eta: Option<NaiveDate>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = order_lines)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderLineRow {
    pub id: Uuid,
    pub orderid: String,
    pub sku: String,
    pub qty: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_lines)]
pub struct NewOrderLineRow<'a> {
    pub id: Uuid,
    pub orderid: &'a str,
    pub sku: &'a str,
    pub qty: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = allocations)]
pub struct NewAllocationRow {
    pub id: Uuid,
    pub orderline_id: Uuid,
    pub batch_id: Uuid,
}
