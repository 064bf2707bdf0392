pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use application::AllocationService;
pub use config::{Config, StorageBackend};
pub use db::{create_pool, DbPool};
pub use errors::StartupError;

use config::ConfigError;
use domain::ports::UnitOfWorkFactory;
use infrastructure::{DieselUnitOfWorkFactory, InMemoryUnitOfWorkFactory};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), StartupError> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| StartupError::Migrations(e.to_string()))?;
    Ok(())
}

/// Pick the storage backend named by `config`. For PostgreSQL this opens the
/// pool and migrates the schema.
pub fn unit_of_work_factory(config: &Config) -> Result<Arc<dyn UnitOfWorkFactory>, StartupError> {
    match config.storage {
        StorageBackend::InMemory => Ok(Arc::new(InMemoryUnitOfWorkFactory::new())),
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or(ConfigError::MissingDatabaseUrl)?;
            let pool = create_pool(database_url, config.pool_size)?;
            run_migrations(&pool)?;
            Ok(Arc::new(DieselUnitOfWorkFactory::new(pool)))
        }
    }
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    service: AllocationService,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let service = web::Data::new(service);
    let openapi = handlers::ApiDoc::openapi();

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .wrap(Logger::default())
            .configure(handlers::configure)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
