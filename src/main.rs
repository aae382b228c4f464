use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;

mod api;
mod audit;
mod auth;
mod calendar;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod policy;
mod routes;
mod service;
mod settings;
mod store;
mod utils;

use config::Config;
use db::init_db;
use settings::SettingsService;
use store::mysql::MySqlStore;

use crate::docs::ApiDoc;
use crate::utils::employee_cache;
use crate::utils::punch_filter;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Workpay core up"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;
    let store = MySqlStore::new(pool.clone());

    // Settings load before the server accepts traffic: migrates old
    // documents and fails fast on an invalid one.
    let settings_doc = SettingsService::load(&store)
        .await
        .expect("settings document invalid")
        .doc()
        .clone();

    let pool_for_filter_warmup = pool.clone();
    let pool_for_cache_warmup = pool.clone();
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    actix_web::rt::spawn(async move {
        if let Err(e) = punch_filter::warmup_punch_filter(&pool_for_filter_warmup, 100).await {
            eprintln!("Failed to warmup punch filter: {:?}", e);
        }
    });

    actix_web::rt::spawn(async move {
        if let Err(e) = employee_cache::warmup_employee_cache(&pool_for_cache_warmup, 250).await {
            eprintln!("Failed to warmup employee cache: {:?}", e);
        }
    });

    // Daily half-day correction + absence sweep, single active instance.
    actix_web::rt::spawn(service::maintenance::run_loop(
        store.clone(),
        settings_doc.clone(),
    ));

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(store.clone()))
            .app_data(Data::new(settings_doc.clone()))
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
