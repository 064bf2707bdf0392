pub mod allocation;

use actix_web::web;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(allocation::add_batch, allocation::allocate, allocation::get_batch),
    components(schemas(
        allocation::AddBatchRequest,
        allocation::AllocateRequest,
        allocation::AllocateResponse,
        allocation::BatchResponse,
        allocation::OrderLineResponse,
        allocation::MessageResponse,
    )),
    tags((name = "allocation", description = "Batch intake and order line allocation"))
)]
pub struct ApiDoc;

/// Register the allocation routes. Expects `web::Data<AllocationService>` in
/// the app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/add_batch", web::post().to(allocation::add_batch))
        .route("/allocate", web::post().to(allocation::allocate))
        .route("/batches/{reference}", web::get().to(allocation::get_batch));
}
