use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    middleware::{platform::PlatformAuth, tenant::FacilitySlug},
    models::auth::AuthenticatedUser,
    services::stats,
    AppState,
};

#[derive(Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

/// GET /stats/overview?year= — the facility dashboard chart payload.
pub async fn facility_overview(
    State(state): State<AppState>,
    facility: FacilitySlug,
    _user: AuthenticatedUser,
    Query(query): Query<YearQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    stats::facility_stats(&state.db, &facility.0, query.year)
        .await
        .map(|s| Json(serde_json::to_value(s).unwrap_or_default()))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

/// GET /platform/stats — platform-wide totals for the developer console.
pub async fn platform_overview(
    State(state): State<AppState>,
    _auth: PlatformAuth,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    stats::platform_stats(&state.db)
        .await
        .map(|s| Json(serde_json::to_value(s).unwrap_or_default()))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}
