// src/main.rs
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use sqlx::PgPool;
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use service_desk::clock::Calendar;
use service_desk::config::Config;
use service_desk::engine::Engine;
use service_desk::store::{MemoryStore, PgStore, Store};
use service_desk::{api, docs, AppState};

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

fn startup_error(context: &str, e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{context}: {e}"))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().map_err(|e| startup_error("configuration", e))?;
    let calendar = Calendar::from_utc_offset_hours(config.utc_offset_hours).ok_or_else(|| {
        startup_error(
            "configuration",
            format!("BUSINESS_UTC_OFFSET_HOURS {} out of range", config.utc_offset_hours),
        )
    })?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url)
                .await
                .map_err(|e| startup_error("failed to connect to DB", e))?;
            let store = PgStore::new(pool);
            store
                .migrate()
                .await
                .map_err(|e| startup_error("failed to run migrations", e))?;
            Arc::new(store)
        }
        None => {
            log::warn!("DATABASE_URL not set, data lives in memory and is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let engine = Engine::with_system_clock(store, calendar)
        .with_notifier_lock_key(config.notifier_lock_key);

    let state = web::Data::new(AppState {
        engine,
        renew_password: config.renew_password.clone(),
        jwt_secret: config.jwt_secret.clone(),
    });

    log::info!("listening on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            // Device clients and the external scheduler
            .configure(api::public_routes)
            // Staff dashboard
            .service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware)
                    .configure(api::admin_routes),
            )
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}
