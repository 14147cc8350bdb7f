use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use crate::AppState;

/// Extractor that validates the `X-Platform-Key` header against
/// `config.platform_admin_key` — gates the developer/platform endpoints.
pub struct PlatformAuth;

impl FromRequestParts<AppState> for PlatformAuth {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get("X-Platform-Key")
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing X-Platform-Key header"))?;

        if key != state.config.platform_admin_key {
            return Err((StatusCode::UNAUTHORIZED, "Invalid platform key"));
        }

        Ok(PlatformAuth)
    }
}
