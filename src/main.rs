use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;
use std::time::Duration;

mod api;
mod config;
mod db;
mod docs;
mod engine;
mod model;
mod routes;
mod utils;

use config::Config;
use db::{init_db, init_schema};

use crate::docs::ApiDoc;
use crate::engine::mysql::MySqlLedger;
use crate::utils::badge_cache::BadgeCache;
use crate::utils::sheet_export::SheetSync;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Tap terminal ready"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "tap.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config.database_url).await;

    if let Err(e) = init_schema(&pool).await {
        error!(error = %e, "Failed to create schema");
        return Err(std::io::Error::other(e));
    }

    let ledger = MySqlLedger::new(pool.clone());
    let badges = BadgeCache::new(
        config.badge_cache_capacity,
        Duration::from_secs(config.badge_cache_ttl_secs),
    );
    let sheet = SheetSync::new(config.sheet_export_path.clone());

    if sheet.is_enabled() {
        // initial snapshot so the sheet exists before the first tap
        sheet.notify(pool.clone());
    }

    let pool_for_cache_warmup = pool.clone();
    let badges_for_warmup = badges.clone();
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    actix_web::rt::spawn(async move {
        if let Err(e) = badges_for_warmup.warmup(&pool_for_cache_warmup, 250).await {
            error!(error = %e, "Failed to warmup badge cache");
        }
    });

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(ledger.clone()))
            .app_data(Data::new(badges.clone()))
            .app_data(Data::new(sheet.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
