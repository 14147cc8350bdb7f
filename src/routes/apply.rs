use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    middleware::{rate_limit::check_rate_limit, tenant::FacilitySlug},
    models::{
        facility::{PendingFacility, SubmitFacilityRequest},
        member::SubmitMemberRequest,
    },
    services::{approval::slugify, metrics::APPLICATIONS_COUNTER},
    AppState,
};

/// Extracts the real client IP from nginx-forwarded headers.
/// Priority: X-Real-IP (set by nginx from CF-Connecting-IP) → first X-Forwarded-For.
pub fn real_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return ip.to_string();
    }
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = xff.split(',').next() {
            return first.trim().to_string();
        }
    }
    "unknown".to_string()
}

/// POST /apply/facility — public facility application form.
pub async fn submit_facility(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SubmitFacilityRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    // Rate limit: 5 applications per hour per IP
    {
        let ip = real_ip(&headers);
        let key = format!("rate:apply-facility:ip:{ip}");
        let mut redis = state.redis.clone();
        check_rate_limit(&mut redis, &key, 5, 3600).await?;
    }

    let name = body.name.trim();
    let email = body.email.trim().to_lowercase();
    let phone = body.phone.trim();
    if name.is_empty() || email.is_empty() || phone.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Name, email and phone are required" })),
        ));
    }
    if !email.contains('@') {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid email address" })),
        ));
    }

    // One application per contact email, and never for an email already approved.
    let already_pending: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM pending_facilities WHERE email = $1)",
    )
    .bind(&email)
    .fetch_one(&state.db)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    let already_approved: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM facilities WHERE email = $1)")
            .bind(&email)
            .fetch_one(&state.db)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    if already_pending || already_approved {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": "An application with this email already exists" })),
        ));
    }

    let pending: PendingFacility = sqlx::query_as(
        "INSERT INTO pending_facilities (name, email, phone, therapy_type, description, address)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(name)
    .bind(&email)
    .bind(phone)
    .bind(&body.therapy_type)
    .bind(&body.description)
    .bind(&body.address)
    .fetch_one(&state.db)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    APPLICATIONS_COUNTER.with_label_values(&["facility"]).inc();

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": pending.id,
            "message": "Application received. You will be contacted after review."
        })),
    ))
}

#[derive(Deserialize)]
pub struct CheckSlugQuery {
    pub name: String,
}

/// GET /apply/check-slug — preview the slug a facility name would get.
pub async fn check_slug(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CheckSlugQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    {
        let ip = real_ip(&headers);
        let key = format!("rate:check-slug:ip:{ip}");
        let mut redis = state.redis.clone();
        check_rate_limit(&mut redis, &key, 30, 60).await?;
    }

    let slug = slugify(&params.name);
    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM facilities WHERE slug = $1)")
        .bind(&slug)
        .fetch_one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    Ok(Json(json!({ "slug": slug, "available": !taken })))
}

/// POST /apply/member — public therapist/parent application under a facility.
pub async fn submit_member(
    State(state): State<AppState>,
    facility: FacilitySlug,
    headers: HeaderMap,
    Json(body): Json<SubmitMemberRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    {
        let ip = real_ip(&headers);
        let key = format!("rate:apply-member:ip:{ip}");
        let mut redis = state.redis.clone();
        check_rate_limit(&mut redis, &key, 10, 3600).await?;
    }

    let email = body.email.trim().to_lowercase();
    if body.first_name.trim().is_empty() || body.last_name.trim().is_empty() || email.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "First name, last name and email are required" })),
        ));
    }

    let schema = crate::db::tenant::schema_name(&facility.0);
    let table = body.kind.pending_table();
    let approved_table = body.kind.approved_table();

    let duplicate: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM \"{schema}\".{table} WHERE email = $1)
         OR EXISTS(SELECT 1 FROM \"{schema}\".{approved_table} WHERE email = $1)"
    ))
    .bind(&email)
    .fetch_one(&state.db)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    if duplicate {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": "An application with this email already exists" })),
        ));
    }

    let id: uuid::Uuid = sqlx::query_scalar(&format!(
        "INSERT INTO \"{schema}\".{table}
             (first_name, last_name, email, phone, address, therapy_type, specialization, special_needs)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING id"
    ))
    .bind(body.first_name.trim())
    .bind(body.last_name.trim())
    .bind(&email)
    .bind(&body.phone)
    .bind(&body.address)
    .bind(&body.therapy_type)
    .bind(&body.specialization)
    .bind(&body.special_needs)
    .fetch_one(&state.db)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    APPLICATIONS_COUNTER
        .with_label_values(&[&body.kind.to_string()])
        .inc();

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": id,
            "message": "Application received. The facility will review it shortly."
        })),
    ))
}
