use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    middleware::tenant::FacilitySlug,
    models::{
        auth::AuthenticatedUser,
        clinic::{ClinicService, CreateClinicServiceRequest, UpdateClinicServiceRequest},
        user::UserRole,
    },
    services::counter,
    AppState,
};

fn require_admin(user: &AuthenticatedUser) -> Result<(), (StatusCode, Json<Value>)> {
    if user.role != UserRole::FacilityAdmin {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Facility administrator access required" })),
        ));
    }
    Ok(())
}

/// GET /clinic-services
pub async fn list_clinic_services(
    State(state): State<AppState>,
    facility: FacilitySlug,
    _user: AuthenticatedUser,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let schema = schema_name(&facility.0);
    sqlx::query_as::<_, ClinicService>(&format!(
        "SELECT * FROM \"{schema}\".clinic_services ORDER BY clinic_id"
    ))
    .fetch_all(&state.db)
    .await
    .map(|items| Json(serde_json::to_value(items).unwrap_or_default()))
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

/// POST /clinic-services — draws the next global clinic id inside the same
/// transaction as the insert, so a failed insert never burns an id.
pub async fn create_clinic_service(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Json(body): Json<CreateClinicServiceRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    require_admin(&user)?;

    if body.name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Service name is required" })),
        ));
    }

    let schema = schema_name(&facility.0);

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    let clinic_id = counter::next_clinic_id(&mut *tx)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    let service: ClinicService = sqlx::query_as(&format!(
        "INSERT INTO \"{schema}\".clinic_services (clinic_id, name, description, department)
         VALUES ($1, $2, $3, COALESCE($4, 'general'))
         RETURNING *"
    ))
    .bind(clinic_id)
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(&body.department)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    tx.commit()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    state
        .clinic_mirror
        .push(clinic_id, &facility.0, &service.name, service.description.as_deref());

    Ok((StatusCode::CREATED, Json(serde_json::to_value(service).unwrap_or_default())))
}

/// PUT /clinic-services/{id}
pub async fn update_clinic_service(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateClinicServiceRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&user)?;

    let schema = schema_name(&facility.0);
    let service: Option<ClinicService> = sqlx::query_as(&format!(
        "UPDATE \"{schema}\".clinic_services SET
           name        = COALESCE($2, name),
           description = COALESCE($3, description),
           department  = COALESCE($4, department)
         WHERE id = $1
         RETURNING *"
    ))
    .bind(id)
    .bind(&body.name)
    .bind(&body.description)
    .bind(&body.department)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    let service = service.ok_or((
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Clinic service not found" })),
    ))?;

    state.clinic_mirror.push(
        service.clinic_id,
        &facility.0,
        &service.name,
        service.description.as_deref(),
    );

    Ok(Json(serde_json::to_value(service).unwrap_or_default()))
}

/// DELETE /clinic-services/{id} — the global id is never reused.
pub async fn delete_clinic_service(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&user)?;

    let schema = schema_name(&facility.0);
    let deleted = sqlx::query(&format!(
        "DELETE FROM \"{schema}\".clinic_services WHERE id = $1"
    ))
    .bind(id)
    .execute(&state.db)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    if deleted.rows_affected() == 0 {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Clinic service not found" })),
        ));
    }

    Ok(Json(json!({ "message": "Clinic service deleted" })))
}
