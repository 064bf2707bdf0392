use allocation_service::{build_server, unit_of_work_factory, AllocationService, Config, StartupError};
use dotenvy::dotenv;

#[actix_web::main]
async fn main() -> Result<(), StartupError> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env()?;
    let uow_factory = unit_of_work_factory(&config)?;

    log::info!(
        "Starting server at http://{}:{} ({} storage)",
        config.host,
        config.port,
        config.storage
    );

    build_server(AllocationService::new(uow_factory), &config.host, config.port)?.await?;
    Ok(())
}
