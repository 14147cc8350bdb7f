use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    db::tenant::schema_name,
    middleware::tenant::FacilitySlug,
    models::{
        auth::AuthenticatedUser,
        message::PaginationQuery,
        session::{RecordSessionRequest, TherapySession},
        user::UserRole,
    },
    AppState,
};

/// POST /sessions — record a completed therapy session (staff only).
pub async fn record_session(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Json(body): Json<RecordSessionRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if user.role == UserRole::Parent {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Only staff can record sessions" })),
        ));
    }
    if !body.duration_minutes.is_finite() || body.duration_minutes < 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "duration_minutes must be a non-negative number" })),
        ));
    }

    let schema = schema_name(&facility.0);
    let session: TherapySession = sqlx::query_as(&format!(
        "INSERT INTO \"{schema}\".therapy_sessions
             (therapist_email, parent_email, duration_minutes, session_date)
         VALUES ($1, $2, $3, $4)
         RETURNING *"
    ))
    .bind(&body.therapist_email)
    .bind(&body.parent_email)
    .bind(body.duration_minutes)
    .bind(body.session_date)
    .fetch_one(&state.db)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    Ok((StatusCode::CREATED, Json(serde_json::to_value(session).unwrap_or_default())))
}

/// GET /sessions — newest first, paginated (staff only).
pub async fn list_sessions(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if user.role == UserRole::Parent {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Only staff can list sessions" })),
        ));
    }

    let schema = schema_name(&facility.0);
    sqlx::query_as::<_, TherapySession>(&format!(
        "SELECT * FROM \"{schema}\".therapy_sessions
         ORDER BY created_at DESC
         LIMIT $1 OFFSET $2"
    ))
    .bind(pagination.per_page())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await
    .map(|items| Json(serde_json::to_value(items).unwrap_or_default()))
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}
