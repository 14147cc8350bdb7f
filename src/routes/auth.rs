use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    middleware::{rate_limit::check_rate_limit, tenant::FacilitySlug},
    models::{
        auth::AuthenticatedUser,
        user::{
            ChangePasswordRequest, ForgotPasswordRequest, InviteUserRequest, LoginRequest,
            LogoutRequest, RefreshTokenRequest, RegisterFromInviteRequest, ResetPasswordRequest,
            User, UserProfile, UserRole,
        },
    },
    routes::apply::real_ip,
    services::{
        auth::AuthService,
        metrics::{INVITATIONS_COUNTER, LOGINS_COUNTER, PASSWORD_RESETS_COUNTER},
    },
    AppState,
};

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    facility: FacilitySlug,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    // Rate limit: 10 attempts per 15 minutes per IP+email
    {
        let ip = real_ip(&headers);
        let key = format!("rate:login:{}:{}:{}", facility.0, ip, body.email.to_lowercase());
        let mut redis = state.redis.clone();
        check_rate_limit(&mut redis, &key, 10, 900).await?;
    }

    match AuthService::login(
        &state.db,
        &facility.0,
        &body.email.to_lowercase(),
        &body.password,
        &state.config.jwt_secret,
        &state.config.jwt_refresh_secret,
        state.config.jwt_expiry_seconds,
        state.config.jwt_refresh_expiry_days,
    )
    .await
    {
        Ok(response) => {
            LOGINS_COUNTER.with_label_values(&[&facility.0, "success"]).inc();
            Ok(Json(serde_json::to_value(response).unwrap_or_default()))
        }
        Err(e) => {
            LOGINS_COUNTER.with_label_values(&[&facility.0, "failure"]).inc();
            let msg = e.to_string();
            let status = if msg.contains("not found") {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::UNAUTHORIZED
            };
            Err((status, Json(json!({ "error": msg }))))
        }
    }
}

/// POST /auth/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    facility: FacilitySlug,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    AuthService::refresh(
        &state.db,
        &facility.0,
        &body.refresh_token,
        &state.config.jwt_secret,
        &state.config.jwt_refresh_secret,
        state.config.jwt_expiry_seconds,
        state.config.jwt_refresh_expiry_days,
    )
    .await
    .map(|r| Json(serde_json::to_value(r).unwrap_or_default()))
    .map_err(|e| (StatusCode::UNAUTHORIZED, Json(json!({ "error": e.to_string() }))))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    facility: FacilitySlug,
    Json(body): Json<LogoutRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    AuthService::logout(
        &state.db,
        &facility.0,
        &body.refresh_token,
        &state.config.jwt_refresh_secret,
    )
    .await
    .map(|_| Json(json!({ "message": "Logged out" })))
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let schema = schema_name(&user.facility);
    let profile: Option<User> = sqlx::query_as(&format!(
        "SELECT id, email, password_hash, first_name, last_name,
                role::TEXT as role, avatar_url, is_active, created_at, updated_at
         FROM \"{schema}\".users WHERE id = $1"
    ))
    .bind(user.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    profile
        .map(|u| Json(serde_json::to_value(UserProfile::from(u)).unwrap_or_default()))
        .ok_or((StatusCode::NOT_FOUND, Json(json!({ "error": "User not found" }))))
}

/// POST /auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if body.new_password.len() < 8 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Password must be at least 8 characters" })),
        ));
    }

    AuthService::change_password(
        &state.db,
        &user.facility,
        user.user_id,
        &body.current_password,
        &body.new_password,
    )
    .await
    .map(|_| Json(json!({ "message": "Password changed; please log in again" })))
    .map_err(|e| {
        let msg = e.to_string();
        let status = if msg.contains("incorrect") {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": msg })))
    })
}

/// POST /auth/forgot-password — always 200, regardless of account existence.
pub async fn forgot_password(
    State(state): State<AppState>,
    facility: FacilitySlug,
    headers: HeaderMap,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    {
        let ip = real_ip(&headers);
        let key = format!("rate:forgot:{}:{}", facility.0, ip);
        let mut redis = state.redis.clone();
        check_rate_limit(&mut redis, &key, 5, 3600).await?;
    }

    PASSWORD_RESETS_COUNTER.with_label_values(&[&facility.0]).inc();

    AuthService::request_password_reset(
        &state.db,
        state.email.as_deref(),
        &facility.0,
        &body.email.to_lowercase(),
        &state.config.app_base_url,
    )
    .await
    .map(|_| Json(json!({ "message": "If the account exists, a reset email has been sent" })))
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

/// POST /auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    facility: FacilitySlug,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if body.new_password.len() < 8 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Password must be at least 8 characters" })),
        ));
    }

    AuthService::reset_password(&state.db, &facility.0, &body.token, &body.new_password)
        .await
        .map(|_| Json(json!({ "message": "Password updated; please log in" })))
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))))
}

/// POST /auth/invite — facility admin invites a new user.
pub async fn invite_user(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Json(body): Json<InviteUserRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if user.role != UserRole::FacilityAdmin {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Facility administrator access required" })),
        ));
    }

    let invite_url = AuthService::create_invitation(
        &state.db,
        state.email.as_deref(),
        &facility.0,
        &body.email.to_lowercase(),
        body.role,
        Some(user.user_id),
        &state.config.app_base_url,
    )
    .await
    .map_err(|e| (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))))?;

    INVITATIONS_COUNTER.with_label_values(&[&facility.0]).inc();

    Ok(Json(json!({
        "message": format!("Invitation sent to {}", body.email),
        "invite_url": invite_url,
    })))
}

/// GET /auth/invitations — facility admin lists pending invitations.
pub async fn list_pending_invitations(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if user.role != UserRole::FacilityAdmin {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Facility administrator access required" })),
        ));
    }

    AuthService::list_pending_invitations(&state.db, &facility.0)
        .await
        .map(|items| Json(serde_json::to_value(items).unwrap_or_default()))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

/// DELETE /auth/invitations/{id}
pub async fn delete_invitation(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if user.role != UserRole::FacilityAdmin {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Facility administrator access required" })),
        ));
    }

    let deleted = AuthService::delete_invitation(&state.db, &facility.0, id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    if !deleted {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Invitation not found" })),
        ));
    }

    Ok(Json(json!({ "message": "Invitation cancelled" })))
}

/// POST /auth/register — redeem an invitation token.
pub async fn register_from_invite(
    State(state): State<AppState>,
    facility: FacilitySlug,
    Json(body): Json<RegisterFromInviteRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if body.password.len() < 8 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Password must be at least 8 characters" })),
        ));
    }

    AuthService::register_from_invite(
        &state.db,
        &facility.0,
        &body.token,
        body.first_name.trim(),
        body.last_name.trim(),
        &body.password,
    )
    .await
    .map(|profile| {
        (
            StatusCode::CREATED,
            Json(serde_json::to_value(profile).unwrap_or_default()),
        )
    })
    .map_err(|e| {
        let msg = e.to_string();
        let status = if msg.contains("duplicate") || msg.contains("unique") {
            StatusCode::CONFLICT
        } else {
            StatusCode::BAD_REQUEST
        };
        (status, Json(json!({ "error": msg })))
    })
}
