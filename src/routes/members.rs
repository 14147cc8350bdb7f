use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    middleware::tenant::FacilitySlug,
    models::{
        auth::AuthenticatedUser,
        member::{
            ApproveMemberRequest, MemberKind, Parent, PendingMember, RejectMemberRequest,
            Therapist,
        },
        user::UserRole,
    },
    services::{approval::ApprovalService, auth::AuthService, metrics::MEMBER_APPROVALS_COUNTER},
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

/// GET /members/therapists
pub async fn list_therapists(
    State(state): State<AppState>,
    facility: FacilitySlug,
    _user: AuthenticatedUser,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let schema = schema_name(&facility.0);
    sqlx::query_as::<_, Therapist>(&format!(
        "SELECT * FROM \"{schema}\".therapists ORDER BY last_name, first_name"
    ))
    .fetch_all(&state.db)
    .await
    .map(|items| Json(serde_json::to_value(items).unwrap_or_default()))
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

/// GET /members/parents
pub async fn list_parents(
    State(state): State<AppState>,
    facility: FacilitySlug,
    _user: AuthenticatedUser,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let schema = schema_name(&facility.0);
    sqlx::query_as::<_, Parent>(&format!(
        "SELECT * FROM \"{schema}\".parents ORDER BY last_name, first_name"
    ))
    .fetch_all(&state.db)
    .await
    .map(|items| Json(serde_json::to_value(items).unwrap_or_default()))
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

#[derive(Deserialize)]
pub struct PendingQuery {
    pub kind: MemberKind,
}

/// GET /members/pending?kind=therapist|parent — facility admin only.
pub async fn list_pending_members(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&user)?;
    let schema = schema_name(&facility.0);
    sqlx::query_as::<_, PendingMember>(&format!(
        "SELECT * FROM \"{schema}\".{} ORDER BY created_at",
        query.kind.pending_table()
    ))
    .fetch_all(&state.db)
    .await
    .map(|items| Json(serde_json::to_value(items).unwrap_or_default()))
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

/// POST /members/pending/{id}/approve — copy into the approved table, then
/// issue a login invitation for the applicant (best-effort email).
pub async fn approve_member(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ApproveMemberRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    require_admin(&user)?;

    let email = ApprovalService::approve_member(&state.db, &facility.0, id, body.kind)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            let status = if msg.contains("not found") {
                StatusCode::NOT_FOUND
            } else if msg.contains("already") {
                StatusCode::CONFLICT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(json!({ "error": msg })))
        })?;

    MEMBER_APPROVALS_COUNTER
        .with_label_values(&[&facility.0, &body.kind.to_string()])
        .inc();

    let role = match body.kind {
        MemberKind::Therapist => UserRole::Therapist,
        MemberKind::Parent => UserRole::Parent,
    };
    let invite_url = AuthService::create_invitation(
        &state.db,
        state.email.as_deref(),
        &facility.0,
        &email,
        role,
        Some(user.user_id),
        &state.config.app_base_url,
    )
    .await
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Member approved but invitation failed: {e}") })),
        )
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("{} approved", body.kind),
            "email": email,
            "invite_url": invite_url,
        })),
    ))
}

/// POST /members/pending/{id}/reject — irreversible, needs confirm.
pub async fn reject_member(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RejectMemberRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&user)?;

    if !body.confirm {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Rejection is irreversible; set confirm = true to proceed" })),
        ));
    }

    let deleted = ApprovalService::reject_member(&state.db, &facility.0, id, body.kind)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    if !deleted {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Pending application not found" })),
        ));
    }

    Ok(Json(json!({ "message": "Application rejected" })))
}
