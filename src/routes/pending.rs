use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    middleware::platform::PlatformAuth,
    models::{
        facility::{PendingFacility, RejectRequest},
        user::UserRole,
    },
    services::{
        approval::ApprovalService,
        auth::AuthService,
        metrics::{FACILITY_APPROVALS_COUNTER, FACILITY_REJECTIONS_COUNTER},
    },
    AppState,
};

/// Maps approval failures onto HTTP statuses. Unique-index violations from
/// the facilities registry (slug or email taken by a racing approval) are
/// duplicate-identity conflicts, not server errors.
fn approval_error_status(msg: &str) -> StatusCode {
    if msg.contains("not found") {
        StatusCode::NOT_FOUND
    } else if msg.contains("already") || msg.contains("duplicate") || msg.contains("unique") {
        StatusCode::CONFLICT
    } else if msg.contains("missing") {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// GET /platform/pending-facilities
pub async fn list_pending_facilities(
    State(state): State<AppState>,
    _auth: PlatformAuth,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    sqlx::query_as::<_, PendingFacility>(
        "SELECT * FROM pending_facilities ORDER BY created_at",
    )
    .fetch_all(&state.db)
    .await
    .map(|items| Json(serde_json::to_value(items).unwrap_or_default()))
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

/// POST /platform/pending-facilities/{id}/approve
///
/// Provisions the facility schema, moves the registry row, assigns the first
/// clinic id and deletes the application atomically, then issues the admin
/// invitation and notifies the contact address. Email and mirror delivery are
/// best-effort; the approval itself has already committed.
pub async fn approve_facility(
    State(state): State<AppState>,
    _auth: PlatformAuth,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let approval = ApprovalService::approve_facility(&state.db, id)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            (approval_error_status(&msg), Json(json!({ "error": msg })))
        })?;

    FACILITY_APPROVALS_COUNTER.inc();

    let facility = &approval.facility;

    // Admin credential issuance: invitation token, never a default password.
    // The token insert must succeed; the notification email is best-effort.
    let invite_url = AuthService::create_invitation(
        &state.db,
        None, // suppress the generic invitation email; the approval notice carries the link
        &facility.slug,
        &facility.email,
        UserRole::FacilityAdmin,
        None,
        &state.config.app_base_url,
    )
    .await
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Facility approved but invitation failed: {e}") })),
        )
    })?;

    if let Some(email_svc) = &state.email {
        if let Err(e) = email_svc
            .send_facility_approved(&facility.email, &facility.name, &invite_url)
            .await
        {
            tracing::warn!("Approval notice to {} failed: {e}", facility.email);
        }
    }

    state.clinic_mirror.push(
        approval.clinic_id,
        &facility.slug,
        &approval.service_name,
        facility.description.as_deref(),
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "facility": facility,
            "clinic_id": approval.clinic_id,
            "invite_url": invite_url,
        })),
    ))
}

/// POST /platform/pending-facilities/{id}/reject — irreversible, needs confirm.
pub async fn reject_facility(
    State(state): State<AppState>,
    _auth: PlatformAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<RejectRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !body.confirm {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Rejection is irreversible; set confirm = true to proceed" })),
        ));
    }

    let deleted = ApprovalService::reject_pending_facility(&state.db, id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    if !deleted {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Pending facility not found" })),
        ));
    }

    FACILITY_REJECTIONS_COUNTER.inc();
    Ok(Json(json!({ "message": "Application rejected" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn racing_duplicate_email_approval_maps_to_conflict() {
        // The losing side of two same-email approvals surfaces Postgres's
        // unique-violation text once the pre-check has already passed.
        let status = approval_error_status(
            r#"duplicate key value violates unique constraint "facilities_email_idx""#,
        );
        assert_eq!(status, StatusCode::CONFLICT);

        let status =
            approval_error_status("A facility with email a@b.org already exists");
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn other_approval_failures_keep_their_statuses() {
        assert_eq!(
            approval_error_status("Pending facility not found"),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            approval_error_status("Pending application is missing name, email or phone"),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            approval_error_status("connection reset"),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
