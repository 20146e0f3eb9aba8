use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let config = state.get_config();
    let stats = state.matchmaking.stats();
    let uptime_seconds = state.get_uptime_seconds();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": "voicematch-backend",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "matchmaking": {
            "users_online": stats.users_online,
            "waiting_users": stats.waiting_users,
            "active_matches": stats.active_matches,
            "total_matches": stats.total_matches
        }
    }))
}

/// Pull-style stats query: the same four counters that are broadcast to
/// connected clients, with the wire field names the clients poll for.
pub async fn stats(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.matchmaking.stats())
}
