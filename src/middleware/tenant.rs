use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::AppState;

/// Validates that a slug only contains lowercase ASCII letters, digits and hyphens,
/// does not start or end with a hyphen, and is between 2 and 63 characters.
/// This prevents SQL injection via the facility slug used in format!() schema queries.
pub fn is_valid_slug(s: &str) -> bool {
    let len = s.len();
    len >= 2
        && len <= 63
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

/// Extracts the facility slug from the `X-Facility` header or first subdomain,
/// then validates the facility exists and is active.
#[derive(Debug, Clone)]
pub struct FacilitySlug(pub String);

impl FromRequestParts<AppState> for FacilitySlug {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let slug = extract_slug(parts)?;

        let row: Option<(bool,)> = sqlx::query_as(
            "SELECT is_active FROM facilities WHERE slug = $1",
        )
        .bind(&slug)
        .fetch_optional(&state.db)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Database error" }))))?;

        match row {
            None => Err((StatusCode::NOT_FOUND, Json(json!({ "error": "Facility not found" })))),
            Some((false,)) => Err((StatusCode::FORBIDDEN, Json(json!({ "error": "Facility account is inactive" })))),
            Some((true,)) => Ok(FacilitySlug(slug)),
        }
    }
}

fn extract_slug(parts: &Parts) -> Result<String, (StatusCode, Json<Value>)> {
    // 1. X-Facility header
    if let Some(facility) = parts
        .headers
        .get("X-Facility")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase())
        .filter(|s| !s.is_empty())
    {
        if !is_valid_slug(&facility) {
            return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid facility identifier" }))));
        }
        return Ok(facility);
    }

    // 2. Subdomain from Host header
    if let Some(host) = parts.headers.get("Host").and_then(|v| v.to_str().ok()) {
        let domain = host.split(':').next().unwrap_or(host);
        let parts_vec: Vec<&str> = domain.split('.').collect();
        if parts_vec.len() >= 3 {
            let subdomain = parts_vec[0].to_lowercase();
            if subdomain != "www" && subdomain != "api" {
                if !is_valid_slug(&subdomain) {
                    return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid facility identifier" }))));
                }
                return Ok(subdomain);
            }
        }
    }

    Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Missing X-Facility header" }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_validation() {
        assert!(is_valid_slug("sunrise-clinic"));
        assert!(is_valid_slug("a2"));
        assert!(!is_valid_slug("a"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("trailing-"));
        assert!(!is_valid_slug("Upper"));
        assert!(!is_valid_slug("has_underscore"));
        assert!(!is_valid_slug("semi;colon"));
    }
}
