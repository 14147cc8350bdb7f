use axum::{
    extract::{Path, Query, State},
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
        message::{CreateMessageRequest, Message, MessageType, MessageWithSender, PaginationQuery},
        user::UserRole,
    },
    services::metrics::MESSAGES_COUNTER,
    AppState,
};

/// GET /messages — broadcasts plus the caller's own individual messages,
/// newest first, paginated.
pub async fn list_messages(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let schema = schema_name(&facility.0);

    sqlx::query_as::<_, MessageWithSender>(&format!(
        "SELECT m.id, m.sender_id, u.first_name AS sender_first_name,
                u.last_name AS sender_last_name, m.message_type::TEXT AS message_type,
                m.recipient_id, m.subject, m.content, m.is_read, m.created_at
         FROM \"{schema}\".messages m
         JOIN \"{schema}\".users u ON u.id = m.sender_id
         WHERE m.message_type = 'broadcast'
            OR m.sender_id = $1
            OR m.recipient_id = $1
         ORDER BY m.created_at DESC
         LIMIT $2 OFFSET $3"
    ))
    .bind(user.user_id)
    .bind(pagination.per_page())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await
    .map(|items| Json(serde_json::to_value(items).unwrap_or_default()))
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

/// POST /messages
pub async fn send_message(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Json(body): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if body.content.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Message content is required" })),
        ));
    }

    match body.message_type {
        MessageType::Broadcast => {
            // Parents cannot broadcast to the whole facility
            if user.role == UserRole::Parent {
                return Err((
                    StatusCode::FORBIDDEN,
                    Json(json!({ "error": "Broadcast messages require staff access" })),
                ));
            }
        }
        MessageType::Individual => {
            if body.recipient_id.is_none() {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Individual messages need a recipient_id" })),
                ));
            }
        }
    }

    let schema = schema_name(&facility.0);
    let message: Message = sqlx::query_as(&format!(
        "INSERT INTO \"{schema}\".messages (sender_id, message_type, recipient_id, subject, content)
         VALUES ($1, $2::\"{schema}\".message_type, $3, $4, $5)
         RETURNING id, sender_id, message_type::TEXT AS message_type, recipient_id,
                   subject, content, is_read, created_at, updated_at"
    ))
    .bind(user.user_id)
    .bind(body.message_type.to_string())
    .bind(body.recipient_id)
    .bind(&body.subject)
    .bind(body.content.trim())
    .fetch_one(&state.db)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    MESSAGES_COUNTER.with_label_values(&[&facility.0]).inc();

    Ok((StatusCode::CREATED, Json(serde_json::to_value(message).unwrap_or_default())))
}

/// GET /messages/conversation/{user_id} — the two-way thread with one user.
pub async fn get_conversation(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Path(other_id): Path<Uuid>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let schema = schema_name(&facility.0);

    sqlx::query_as::<_, MessageWithSender>(&format!(
        "SELECT m.id, m.sender_id, u.first_name AS sender_first_name,
                u.last_name AS sender_last_name, m.message_type::TEXT AS message_type,
                m.recipient_id, m.subject, m.content, m.is_read, m.created_at
         FROM \"{schema}\".messages m
         JOIN \"{schema}\".users u ON u.id = m.sender_id
         WHERE m.message_type = 'individual'
           AND ((m.sender_id = $1 AND m.recipient_id = $2)
             OR (m.sender_id = $2 AND m.recipient_id = $1))
         ORDER BY m.created_at DESC
         LIMIT $3 OFFSET $4"
    ))
    .bind(user.user_id)
    .bind(other_id)
    .bind(pagination.per_page())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await
    .map(|items| Json(serde_json::to_value(items).unwrap_or_default()))
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
}

/// POST /messages/{id}/read — only the recipient can mark a message read.
pub async fn mark_read(
    State(state): State<AppState>,
    facility: FacilitySlug,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let schema = schema_name(&facility.0);

    let updated = sqlx::query(&format!(
        "UPDATE \"{schema}\".messages SET is_read = TRUE
         WHERE id = $1 AND recipient_id = $2"
    ))
    .bind(id)
    .bind(user.user_id)
    .execute(&state.db)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    if updated.rows_affected() == 0 {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Message not found" })),
        ));
    }

    Ok(Json(json!({ "message": "Marked as read" })))
}
