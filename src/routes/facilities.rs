use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    db::tenant::schema_name,
    middleware::{
        platform::PlatformAuth,
        tenant::{is_valid_slug, FacilitySlug},
    },
    models::{
        auth::AuthenticatedUser,
        facility::{Facility, UpdateFacilityProfileRequest, UpdateFacilityRequest},
        user::{InviteUserRequest, UserRole},
    },
    services::auth::AuthService,
    AppState,
};

// ─── Platform-side facility registry ──────────────────────────────────────────

/// Platform routes take the slug from the URL path, so it must pass the same
/// validation the tenant extractor enforces before it reaches any
/// schema-interpolated statement.
fn validated_slug(slug: &str) -> Result<(), (StatusCode, Json<Value>)> {
    if !is_valid_slug(slug) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid facility identifier" })),
        ));
    }
    Ok(())
}

pub async fn list_facilities(
    State(state): State<AppState>,
    _auth: PlatformAuth,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    sqlx::query_as::<_, Facility>("SELECT * FROM facilities ORDER BY name")
        .fetch_all(&state.db)
        .await
        .map(|items| Json(serde_json::to_value(items).unwrap_or_default()))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

pub async fn get_facility(
    State(state): State<AppState>,
    _auth: PlatformAuth,
    Path(slug): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    sqlx::query_as::<_, Facility>("SELECT * FROM facilities WHERE slug = $1")
        .bind(&slug)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?
        .map(|f| Json(serde_json::to_value(f).unwrap_or_default()))
        .ok_or((StatusCode::NOT_FOUND, Json(json!({ "error": "Facility not found" }))))
}

pub async fn update_facility(
    State(state): State<AppState>,
    _auth: PlatformAuth,
    Path(slug): Path<String>,
    Json(body): Json<UpdateFacilityRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    sqlx::query_as::<_, Facility>(
        "UPDATE facilities SET
           name      = COALESCE($2, name),
           email     = COALESCE($3, email),
           phone     = COALESCE($4, phone),
           address   = COALESCE($5, address),
           is_active = COALESCE($6, is_active),
           updated_at = NOW()
         WHERE slug = $1
         RETURNING *",
    )
    .bind(&slug)
    .bind(&body.name)
    .bind(&body.email)
    .bind(&body.phone)
    .bind(&body.address)
    .bind(body.is_active)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?
    .map(|f| Json(serde_json::to_value(f).unwrap_or_default()))
    .ok_or((StatusCode::NOT_FOUND, Json(json!({ "error": "Facility not found" }))))
}

/// DELETE /platform/facilities/{slug} — drops the whole tenant schema.
pub async fn delete_facility(
    State(state): State<AppState>,
    _auth: PlatformAuth,
    Path(slug): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    validated_slug(&slug)?;
    let schema = schema_name(&slug);

    // Drop facility schema (cascades to all tables/types/functions in it)
    sqlx::raw_sql(&format!("DROP SCHEMA IF EXISTS \"{schema}\" CASCADE"))
        .execute(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    let deleted = sqlx::query("DELETE FROM facilities WHERE slug = $1")
        .bind(&slug)
        .execute(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    if deleted.rows_affected() == 0 {
        return Err((StatusCode::NOT_FOUND, Json(json!({ "error": "Facility not found" }))));
    }

    Ok(Json(json!({ "message": "Facility deleted" })))
}

/// POST /platform/facilities/{slug}/invite — platform-issued invitation.
pub async fn invite_facility_user(
    State(state): State<AppState>,
    _auth: PlatformAuth,
    Path(slug): Path<String>,
    Json(body): Json<InviteUserRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    validated_slug(&slug)?;

    AuthService::create_invitation(
        &state.db,
        state.email.as_deref(),
        &slug,
        &body.email,
        body.role,
        None, // invited_by is null for platform invitations
        &state.config.app_base_url,
    )
    .await
    .map(|invite_url| Json(json!({ "message": format!("Invitation sent to {}", body.email), "invite_url": invite_url })))
    .map_err(|e| (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))))
}

// ─── Facility self-service profile ────────────────────────────────────────────

/// GET /facility/profile — any authenticated facility user.
pub async fn get_profile(
    State(state): State<AppState>,
    facility: FacilitySlug,
    _user: AuthenticatedUser,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    sqlx::query_as::<_, Facility>("SELECT * FROM facilities WHERE slug = $1")
        .bind(&facility.0)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?
        .map(|f| Json(serde_json::to_value(f).unwrap_or_default()))
        .ok_or((StatusCode::NOT_FOUND, Json(json!({ "error": "Facility not found" }))))
}

/// PUT /facility/profile — facility admin only.
pub async fn update_profile(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Json(body): Json<UpdateFacilityProfileRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if user.role != UserRole::FacilityAdmin {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Only the facility administrator can edit the profile" })),
        ));
    }

    sqlx::query_as::<_, Facility>(
        "UPDATE facilities SET
           phone                 = COALESCE($2, phone),
           address               = COALESCE($3, address),
           description           = COALESCE($4, description),
           therapy_service       = COALESCE($5, therapy_service),
           image_url             = COALESCE($6, image_url),
           additional_images     = COALESCE($7, additional_images),
           schedule_availability = COALESCE($8, schedule_availability),
           updated_at = NOW()
         WHERE slug = $1
         RETURNING *",
    )
    .bind(&facility.0)
    .bind(&body.phone)
    .bind(&body.address)
    .bind(&body.description)
    .bind(&body.therapy_service)
    .bind(&body.image_url)
    .bind(&body.additional_images)
    .bind(&body.schedule_availability)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?
    .map(|f| Json(serde_json::to_value(f).unwrap_or_default()))
    .ok_or((StatusCode::NOT_FOUND, Json(json!({ "error": "Facility not found" }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_slug_with_quoted_identifier_breakout_is_rejected() {
        // A quote in the slug would escape the quoted schema identifier and
        // let extra statements ride along with the DROP SCHEMA DDL.
        let slug = r#"x" CASCADE; DROP TABLE facilities; DROP SCHEMA IF EXISTS "foo"#;
        assert!(validated_slug(slug).is_err());
        assert!(validated_slug("evil;slug").is_err());
        assert!(validated_slug("UPPER").is_err());
        assert!(validated_slug("sunrise-clinic").is_ok());
    }
}
