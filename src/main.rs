//! # Voicematch Backend - Main Application Entry Point
//!
//! Sets up the Actix-web server that hosts the anonymous voice matchmaking
//! service: the `/ws` WebSocket endpoint, the stats and health endpoints,
//! and the runtime configuration API.
//!
//! ## Application Architecture:
//! - **config**: Application configuration (TOML file + environment variables)
//! - **state**: Shared application state (config handle + matchmaking service)
//! - **matching**: The matchmaking engine (registry, waiting pool, matches)
//! - **websocket**: Per-connection WebSocket actors bridging clients to the engine
//! - **health**: Health check and public stats endpoints
//! - **middleware**: Custom request logging
//! - **handlers**: Config API handlers
//! - **error**: Custom error types and HTTP error responses
//!
//! Besides the HTTP server, three background jobs drive the engine on
//! timers: the matchmaking pass, the waiting-pool sweep, and the stale
//! match sweep. All of them stop with the server.

mod config;
mod error;
mod handlers;
mod health;
mod matching;
mod middleware;
mod state;
mod websocket;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global shutdown flag set by the signal handler task. The server loop and
/// the background jobs poll it.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting voicematch-backend v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded: {}:{}",
        config.server.host, config.server.port
    );

    let app_state = AppState::new(config.clone());
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();
    spawn_background_jobs(&app_state);

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new({
        let app_state = app_state.clone();
        move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .app_data(web::Data::new(app_state.clone()))
                .wrap(cors)
                .wrap(Logger::default())
                .wrap(middleware::RequestLogging)
                .route("/ws", web::get().to(websocket::match_websocket))
                .route("/stats", web::get().to(health::stats))
                .route("/health", web::get().to(health::health_check))
                .service(
                    web::scope("/api/v1")
                        .route("/health", web::get().to(health::health_check))
                        .route("/stats", web::get().to(health::stats))
                        .route("/config", web::get().to(handlers::get_config))
                        .route("/config", web::put().to(handlers::update_config)),
                )
        }
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize structured logging.
///
/// `RUST_LOG` controls the filter; without it the default keeps our own
/// crate at debug and actix at info.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voicematch_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Spawn the three periodic jobs that drive the matchmaking engine:
/// the matching pass, the waiting-pool sweep, and the stale match sweep.
///
/// Each job reads its period from the shared configuration on every
/// iteration, so runtime config updates take effect without a restart.
fn spawn_background_jobs(state: &AppState) {
    let service = state.matchmaking.clone();
    let config = state.config.clone();
    tokio::spawn(async move {
        loop {
            let period = config.read().unwrap().matching.tick_seconds;
            tokio::time::sleep(Duration::from_secs(period)).await;
            if SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
                break;
            }
            service.run_matching_pass();
        }
    });

    let service = state.matchmaking.clone();
    let config = state.config.clone();
    tokio::spawn(async move {
        loop {
            let period = config.read().unwrap().cleanup.waiting_sweep_seconds;
            tokio::time::sleep(Duration::from_secs(period)).await;
            if SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
                break;
            }
            service.sweep_waiting();
        }
    });

    let service = state.matchmaking.clone();
    let config = state.config.clone();
    tokio::spawn(async move {
        loop {
            let period = config.read().unwrap().cleanup.match_sweep_seconds;
            tokio::time::sleep(Duration::from_secs(period)).await;
            if SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
                break;
            }
            service.sweep_matches();
        }
    });
}

/// Install SIGTERM/SIGINT handlers that set the global shutdown flag.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Poll the shutdown flag until it is set.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
