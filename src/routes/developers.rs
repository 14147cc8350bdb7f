use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    middleware::platform::PlatformAuth,
    models::developer::{Developer, UpsertDeveloperRequest},
    AppState,
};

/// GET /platform/developers
pub async fn list_developers(
    State(state): State<AppState>,
    _auth: PlatformAuth,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    sqlx::query_as::<_, Developer>("SELECT * FROM developers ORDER BY last_name, first_name")
        .fetch_all(&state.db)
        .await
        .map(|items| Json(serde_json::to_value(items).unwrap_or_default()))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

/// GET /platform/developers/{email} — single indexed lookup, never a scan.
pub async fn get_developer(
    State(state): State<AppState>,
    _auth: PlatformAuth,
    Path(email): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    sqlx::query_as::<_, Developer>("SELECT * FROM developers WHERE email = $1")
        .bind(email.to_lowercase())
        .fetch_optional(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?
        .map(|d| Json(serde_json::to_value(d).unwrap_or_default()))
        .ok_or((StatusCode::NOT_FOUND, Json(json!({ "error": "Developer not found" }))))
}

/// PUT /platform/developers/{email} — create or update the profile for an email.
pub async fn upsert_developer(
    State(state): State<AppState>,
    _auth: PlatformAuth,
    Path(email): Path<String>,
    Json(body): Json<UpsertDeveloperRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let email = email.to_lowercase();
    if !email.contains('@') {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid email address" })),
        ));
    }

    sqlx::query_as::<_, Developer>(
        "INSERT INTO developers (email, first_name, last_name, phone, avatar_url)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (email) DO UPDATE SET
           first_name = EXCLUDED.first_name,
           last_name  = EXCLUDED.last_name,
           phone      = EXCLUDED.phone,
           avatar_url = EXCLUDED.avatar_url,
           updated_at = NOW()
         RETURNING *",
    )
    .bind(&email)
    .bind(&body.first_name)
    .bind(&body.last_name)
    .bind(&body.phone)
    .bind(&body.avatar_url)
    .fetch_one(&state.db)
    .await
    .map(|d| Json(serde_json::to_value(d).unwrap_or_default()))
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}
