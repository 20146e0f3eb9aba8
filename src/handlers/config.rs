use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn get_config(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config_document(&config)
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> AppResult<HttpResponse> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config
        .update_from_json(&json_str)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state
        .update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": config_document(&current_config)
    })))
}

fn config_document(config: &crate::config::AppConfig) -> serde_json::Value {
    json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port
        },
        "matching": {
            "tick_seconds": config.matching.tick_seconds,
            "max_age_gap": config.matching.max_age_gap,
            "no_match_notice_seconds": config.matching.no_match_notice_seconds,
            "no_match_repeat_seconds": config.matching.no_match_repeat_seconds
        },
        "cleanup": {
            "waiting_sweep_seconds": config.cleanup.waiting_sweep_seconds,
            "waiting_timeout_seconds": config.cleanup.waiting_timeout_seconds,
            "match_sweep_seconds": config.cleanup.match_sweep_seconds,
            "match_timeout_seconds": config.cleanup.match_timeout_seconds
        }
    })
}
