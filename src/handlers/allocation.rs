use actix_web::{web, HttpResponse};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::application::AllocationService;
use crate::domain::model::Batch;
use crate::errors::AppError;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddBatchRequest {
    #[serde(rename = "ref")]
    pub reference: String,
    pub sku: String,
    pub qty: u32,
    /// ISO-8601 date or date-time; `null` or absent for stock already on hand.
    #[serde(default)]
    pub eta: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AllocateRequest {
    pub orderid: String,
    pub sku: String,
    pub qty: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AllocateResponse {
    pub batchref: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineResponse {
    pub orderid: String,
    pub sku: String,
    pub qty: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BatchResponse {
    pub reference: String,
    pub sku: String,
    pub purchased_quantity: u32,
    pub available_quantity: u32,
    pub eta: Option<NaiveDate>,
    pub allocations: Vec<OrderLineResponse>,
}

impl From<Batch> for BatchResponse {
    fn from(batch: Batch) -> Self {
        let mut allocations: Vec<OrderLineResponse> = batch
            .allocations()
            .iter()
            .map(|line| OrderLineResponse {
                orderid: line.order_id.clone(),
                sku: line.sku.clone(),
                qty: line.quantity,
            })
            .collect();
        allocations.sort_by(|a, b| a.orderid.cmp(&b.orderid).then(a.qty.cmp(&b.qty)));

        Self {
            reference: batch.reference().to_string(),
            sku: batch.sku().to_string(),
            purchased_quantity: batch.purchased_quantity(),
            available_quantity: batch.available_quantity(),
            eta: batch.eta(),
            allocations,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Largest quantity the `INT4` columns can hold.
const MAX_QUANTITY: u32 = i32::MAX as u32;

fn check_quantity(qty: u32) -> Result<u32, AppError> {
    if qty > MAX_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "qty {} exceeds the maximum of {}",
            qty, MAX_QUANTITY
        )));
    }
    Ok(qty)
}

/// Accepts `2024-05-01`, `2024-05-01T10:00:00` or a full RFC 3339 timestamp
/// and keeps the date part.
fn parse_eta(raw: &str) -> Result<NaiveDate, AppError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| raw.parse::<NaiveDateTime>().map(|dt| dt.date()))
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| AppError::BadRequest(format!("Invalid eta '{}'", raw)))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /add_batch
///
/// Registers a new batch of stock and commits it.
#[utoipa::path(
    post,
    path = "/add_batch",
    request_body = AddBatchRequest,
    responses(
        (status = 201, description = "Batch added", body = String, example = json!("OK")),
        (status = 400, description = "Malformed eta, qty out of range or duplicate reference", body = MessageResponse),
        (status = 725, description = "Database error"),
    ),
    tag = "allocation"
)]
pub async fn add_batch(
    service: web::Data<AllocationService>,
    body: web::Json<AddBatchRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let qty = check_quantity(body.qty)?;
    let eta = body.eta.as_deref().map(parse_eta).transpose()?;

    web::block(move || service.add_batch(&body.reference, &body.sku, qty, eta))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().body("OK"))
}

/// POST /allocate
///
/// Allocates an order line to the preferred batch for its sku: stock on hand
/// first, then the earliest shipment.
#[utoipa::path(
    post,
    path = "/allocate",
    request_body = AllocateRequest,
    responses(
        (status = 201, description = "Line allocated", body = AllocateResponse),
        (status = 400, description = "Invalid sku or out of stock", body = MessageResponse),
        (status = 725, description = "Database error"),
    ),
    tag = "allocation"
)]
pub async fn allocate(
    service: web::Data<AllocationService>,
    body: web::Json<AllocateRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    let batchref = web::block(move || service.allocate(&body.orderid, &body.sku, body.qty))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(AllocateResponse { batchref }))
}

/// GET /batches/{reference}
#[utoipa::path(
    get,
    path = "/batches/{reference}",
    params(
        ("reference" = String, Path, description = "Batch reference"),
    ),
    responses(
        (status = 200, description = "Batch found", body = BatchResponse),
        (status = 404, description = "Batch not found", body = MessageResponse),
        (status = 725, description = "Database error"),
    ),
    tag = "allocation"
)]
pub async fn get_batch(
    service: web::Data<AllocationService>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let reference = path.into_inner();

    let batch = web::block(move || service.get_batch(&reference))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(BatchResponse::from(batch)))
}
