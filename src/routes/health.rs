use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::AppState;

/// GET /health — liveness probe covering both backing stores.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let db_ok = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();

    let mut redis = state.redis.clone();
    let pong: Result<String, _> = redis::cmd("PING").query_async(&mut redis).await;
    let redis_ok = pong.is_ok();

    let status = if db_ok && redis_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "service": "unifiedcare-api",
            "version": env!("CARGO_PKG_VERSION"),
            "db": if db_ok { "connected" } else { "unreachable" },
            "redis": if redis_ok { "connected" } else { "unreachable" },
        })),
    )
}
