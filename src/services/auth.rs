use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    models::{
        auth::{Claims, RefreshClaims},
        user::{
            InvitationToken, LoginResponse, PendingInvitationDto, RefreshToken, User, UserProfile,
            UserRole,
        },
    },
    services::email::EmailService,
};

fn build_facility_reset_url(base_url: &str, facility: &str, token: &str) -> String {
    if let Some(idx) = base_url.find("://") {
        let scheme = &base_url[..idx];
        let domain = &base_url[idx + 3..];
        format!("{scheme}://{facility}.{domain}/reset-password?token={token}")
    } else {
        format!("https://{facility}.{base_url}/reset-password?token={token}")
    }
}

fn build_facility_invite_url(base_url: &str, facility: &str, token: &str) -> String {
    if let Some(idx) = base_url.find("://") {
        let scheme = &base_url[..idx];
        let domain = &base_url[idx + 3..];
        format!("{scheme}://{facility}.{domain}/register?token={token}")
    } else {
        format!("https://{facility}.{base_url}/register?token={token}")
    }
}

fn random_token(len: usize) -> String {
    use rand::Rng;
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub struct AuthService;

impl AuthService {
    /// Validate credentials and issue a JWT access + refresh token pair.
    pub async fn login(
        pool: &PgPool,
        facility: &str,
        email: &str,
        password: &str,
        jwt_secret: &str,
        refresh_secret: &str,
        access_ttl: u64,
        refresh_ttl_days: u64,
    ) -> anyhow::Result<LoginResponse> {
        let schema = schema_name(facility);

        // Check the facility schema actually exists before querying it.
        let schema_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM pg_namespace WHERE nspname = $1)",
        )
        .bind(&schema)
        .fetch_one(pool)
        .await?;
        if !schema_exists {
            anyhow::bail!("Facility not found: check the facility identifier");
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT id, email, password_hash, first_name, last_name,
                role::TEXT as role, avatar_url, is_active, created_at, updated_at
             FROM \"{schema}\".users WHERE email = $1 AND is_active = TRUE"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Invalid credentials"))?;

        let valid = bcrypt::verify(password, &user.password_hash)
            .map_err(|_| anyhow::anyhow!("Invalid credentials"))?;
        if !valid {
            anyhow::bail!("Invalid credentials");
        }

        let role: UserRole = user.role.parse().unwrap_or(UserRole::Parent);
        let access_token =
            Self::generate_access_token_with_role(&user, role, facility, jwt_secret, access_ttl)?;
        let (refresh_token_str, refresh_id) =
            Self::generate_refresh_token(&user.id, refresh_secret, refresh_ttl_days)?;

        let hash = bcrypt::hash(&refresh_token_str, 8)?;
        let expires_at = Utc::now() + chrono::Duration::days(refresh_ttl_days as i64);
        sqlx::query(&format!(
            "INSERT INTO \"{schema}\".refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)"
        ))
        .bind(refresh_id)
        .bind(user.id)
        .bind(hash)
        .bind(expires_at)
        .execute(pool)
        .await?;

        let facility_name: Option<String> =
            sqlx::query_scalar("SELECT name FROM facilities WHERE slug = $1")
                .bind(facility)
                .fetch_optional(pool)
                .await
                .ok()
                .flatten();

        Ok(LoginResponse {
            access_token,
            refresh_token: refresh_token_str,
            user: user.into(),
            facility_name: facility_name.unwrap_or_else(|| facility.to_string()),
        })
    }

    pub fn generate_access_token(
        user: &User,
        facility: &str,
        secret: &str,
        ttl_seconds: u64,
    ) -> anyhow::Result<String> {
        let role: UserRole = user.role.parse().unwrap_or(UserRole::Parent);
        Self::generate_access_token_with_role(user, role, facility, secret, ttl_seconds)
    }

    pub fn generate_access_token_with_role(
        user: &User,
        role: UserRole,
        facility: &str,
        secret: &str,
        ttl_seconds: u64,
    ) -> anyhow::Result<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user.id.to_string(),
            facility: facility.to_string(),
            role,
            iat: now,
            exp: now + ttl_seconds as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok(token)
    }

    fn generate_refresh_token(
        user_id: &Uuid,
        secret: &str,
        ttl_days: u64,
    ) -> anyhow::Result<(String, Uuid)> {
        let now = Utc::now().timestamp() as usize;
        let jti = Uuid::new_v4();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            jti: jti.to_string(),
            iat: now,
            exp: now + (ttl_days * 86400) as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok((token, jti))
    }

    /// Rotate refresh token: revoke old, issue new pair.
    pub async fn refresh(
        pool: &PgPool,
        facility: &str,
        refresh_token_str: &str,
        jwt_secret: &str,
        refresh_secret: &str,
        access_ttl: u64,
        refresh_ttl_days: u64,
    ) -> anyhow::Result<LoginResponse> {
        use jsonwebtoken::{decode, DecodingKey, Validation};

        let key = DecodingKey::from_secret(refresh_secret.as_bytes());
        let data = decode::<RefreshClaims>(
            refresh_token_str,
            &key,
            &Validation::new(Algorithm::HS256),
        )?;
        let rc = data.claims;
        let jti: Uuid = rc.jti.parse()?;
        let user_id: Uuid = rc.sub.parse()?;

        let schema = schema_name(facility);

        let stored: RefreshToken = sqlx::query_as(&format!(
            "SELECT * FROM \"{schema}\".refresh_tokens WHERE id = $1 AND revoked = FALSE"
        ))
        .bind(jti)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Refresh token not found or revoked"))?;

        if stored.expires_at < Utc::now() {
            anyhow::bail!("Refresh token expired");
        }
        if !bcrypt::verify(refresh_token_str, &stored.token_hash)? {
            anyhow::bail!("Refresh token invalid");
        }

        sqlx::query(&format!(
            "UPDATE \"{schema}\".refresh_tokens SET revoked = TRUE WHERE id = $1"
        ))
        .bind(jti)
        .execute(pool)
        .await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT id, email, password_hash, first_name, last_name,
                role::TEXT as role, avatar_url, is_active, created_at, updated_at
             FROM \"{schema}\".users WHERE id = $1 AND is_active = TRUE"
        ))
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let access_token = Self::generate_access_token(&user, facility, jwt_secret, access_ttl)?;
        let (new_refresh, new_jti) =
            Self::generate_refresh_token(&user.id, refresh_secret, refresh_ttl_days)?;

        let hash = bcrypt::hash(&new_refresh, 8)?;
        let expires_at = Utc::now() + chrono::Duration::days(refresh_ttl_days as i64);

        sqlx::query(&format!(
            "INSERT INTO \"{schema}\".refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)"
        ))
        .bind(new_jti)
        .bind(user.id)
        .bind(hash)
        .bind(expires_at)
        .execute(pool)
        .await?;

        let facility_name: Option<String> =
            sqlx::query_scalar("SELECT name FROM facilities WHERE slug = $1")
                .bind(facility)
                .fetch_optional(pool)
                .await
                .ok()
                .flatten();

        Ok(LoginResponse {
            access_token,
            refresh_token: new_refresh,
            user: user.into(),
            facility_name: facility_name.unwrap_or_else(|| facility.to_string()),
        })
    }

    /// Revoke a refresh token (logout).
    pub async fn logout(
        pool: &PgPool,
        facility: &str,
        refresh_token_str: &str,
        refresh_secret: &str,
    ) -> anyhow::Result<()> {
        use jsonwebtoken::{decode, DecodingKey, Validation};

        let schema = schema_name(facility);

        let key = DecodingKey::from_secret(refresh_secret.as_bytes());
        let data =
            decode::<RefreshClaims>(refresh_token_str, &key, &Validation::new(Algorithm::HS256));

        if let Ok(data) = data {
            let jti: Uuid = data.claims.jti.parse()?;
            sqlx::query(&format!(
                "UPDATE \"{schema}\".refresh_tokens SET revoked = TRUE WHERE id = $1"
            ))
            .bind(jti)
            .execute(pool)
            .await?;
        }

        Ok(())
    }

    /// Create an invitation token and attempt to send the invitation email.
    ///
    /// The registration URL is always returned so a caller can surface it to
    /// the operator even when SMTP is down or unconfigured — credential
    /// issuance never silently depends on email delivery.
    pub async fn create_invitation(
        pool: &PgPool,
        email_svc: Option<&EmailService>,
        facility: &str,
        email: &str,
        role: UserRole,
        invited_by: Option<Uuid>,
        base_url: &str,
    ) -> anyhow::Result<String> {
        let schema = schema_name(facility);
        let token = random_token(48);
        let expires_at = Utc::now() + chrono::Duration::days(7);

        sqlx::query(&format!(
            "INSERT INTO \"{schema}\".invitation_tokens (email, token, role, invited_by, expires_at)
             VALUES ($1, $2, $3::\"{schema}\".user_role, $4, $5)"
        ))
        .bind(email)
        .bind(&token)
        .bind(role.to_string())
        .bind(invited_by)
        .bind(expires_at)
        .execute(pool)
        .await?;

        let facility_name: String =
            sqlx::query_scalar("SELECT name FROM facilities WHERE slug = $1")
                .bind(facility)
                .fetch_optional(pool)
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| facility.to_string());

        let invite_url = build_facility_invite_url(base_url, facility, &token);

        if let Some(svc) = email_svc {
            if let Err(e) = svc
                .send_invitation(email, &invite_url, &facility_name, &role.to_string())
                .await
            {
                tracing::warn!("Invitation email to {email} failed: {e}");
            }
        } else {
            tracing::warn!("SMTP not configured — invitation for {email} not emailed");
        }

        Ok(invite_url)
    }

    /// Send a password reset email. Always returns Ok to avoid leaking account existence.
    pub async fn request_password_reset(
        pool: &PgPool,
        email_svc: Option<&EmailService>,
        facility: &str,
        email: &str,
        base_url: &str,
    ) -> anyhow::Result<()> {
        let schema = schema_name(facility);

        let user_opt: Option<(Uuid, String, String)> = sqlx::query_as(&format!(
            "SELECT id, first_name, last_name FROM \"{schema}\".users
             WHERE email = $1 AND is_active = TRUE"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await?;

        if let Some((user_id, first_name, last_name)) = user_opt {
            let token = random_token(48);
            let expires_at = Utc::now() + chrono::Duration::hours(1);

            sqlx::query(&format!(
                "INSERT INTO \"{schema}\".password_reset_tokens (user_id, token, expires_at)
                 VALUES ($1, $2, $3)"
            ))
            .bind(user_id)
            .bind(&token)
            .bind(expires_at)
            .execute(pool)
            .await?;

            if let Some(svc) = email_svc {
                let facility_name: String =
                    sqlx::query_scalar("SELECT name FROM facilities WHERE slug = $1")
                        .bind(facility)
                        .fetch_optional(pool)
                        .await
                        .ok()
                        .flatten()
                        .unwrap_or_else(|| facility.to_string());

                let reset_url = build_facility_reset_url(base_url, facility, &token);
                let display_name = format!("{first_name} {last_name}");
                // Ignore send errors — graceful degradation
                let _ = svc
                    .send_password_reset(email, &display_name, &reset_url, &facility_name)
                    .await;
            }
        }

        Ok(())
    }

    /// Verify token, hash new password, revoke all refresh tokens, mark token used.
    pub async fn reset_password(
        pool: &PgPool,
        facility: &str,
        token_str: &str,
        new_password: &str,
    ) -> anyhow::Result<()> {
        let schema = schema_name(facility);

        let row: Option<(Uuid, Uuid)> = sqlx::query_as(&format!(
            "SELECT id, user_id FROM \"{schema}\".password_reset_tokens
             WHERE token = $1 AND used = FALSE AND expires_at > NOW()"
        ))
        .bind(token_str)
        .fetch_optional(pool)
        .await?;

        let (token_id, user_id) =
            row.ok_or_else(|| anyhow::anyhow!("Token invalid or expired"))?;

        let password_hash = bcrypt::hash(new_password, 12)?;

        sqlx::query(&format!(
            "UPDATE \"{schema}\".users SET password_hash = $1 WHERE id = $2"
        ))
        .bind(&password_hash)
        .bind(user_id)
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            "UPDATE \"{schema}\".refresh_tokens SET revoked = TRUE WHERE user_id = $1"
        ))
        .bind(user_id)
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            "UPDATE \"{schema}\".password_reset_tokens SET used = TRUE WHERE id = $1"
        ))
        .bind(token_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Register a user from an invitation token. The user chooses their own
    /// password here; no credential is ever issued with a default password.
    pub async fn register_from_invite(
        pool: &PgPool,
        facility: &str,
        token_str: &str,
        first_name: &str,
        last_name: &str,
        password: &str,
    ) -> anyhow::Result<UserProfile> {
        let schema = schema_name(facility);

        let invite: InvitationToken = sqlx::query_as(&format!(
            "SELECT id, email, token, role::TEXT as role, invited_by, used, expires_at, created_at
             FROM \"{schema}\".invitation_tokens WHERE token = $1 AND used = FALSE"
        ))
        .bind(token_str)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Invalid or already-used invitation token"))?;

        if invite.expires_at < Utc::now() {
            anyhow::bail!("Invitation token expired");
        }

        let password_hash = bcrypt::hash(password, 12)?;

        let user: User = sqlx::query_as(&format!(
            "INSERT INTO \"{schema}\".users (email, password_hash, first_name, last_name, role)
             VALUES ($1, $2, $3, $4, $5::\"{schema}\".user_role)
             RETURNING id, email, password_hash, first_name, last_name,
                       role::TEXT as role, avatar_url, is_active, created_at, updated_at"
        ))
        .bind(&invite.email)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .bind(&invite.role)
        .fetch_one(pool)
        .await?;

        // Registration marks the facility contact as verified when the new
        // account is the facility admin for that address.
        if invite.role == UserRole::FacilityAdmin.to_string() {
            sqlx::query(
                "UPDATE facilities SET email_verified = TRUE, updated_at = NOW()
                 WHERE slug = $1 AND email = $2",
            )
            .bind(facility)
            .bind(&invite.email)
            .execute(pool)
            .await?;
        }

        sqlx::query(&format!(
            "UPDATE \"{schema}\".invitation_tokens SET used = TRUE WHERE id = $1"
        ))
        .bind(invite.id)
        .execute(pool)
        .await?;

        Ok(user.into())
    }

    /// Change user's password (requires current password verification).
    pub async fn change_password(
        pool: &PgPool,
        facility: &str,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> anyhow::Result<()> {
        let schema = schema_name(facility);

        let password_hash: String = sqlx::query_scalar(&format!(
            "SELECT password_hash FROM \"{schema}\".users WHERE id = $1 AND is_active = TRUE"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found"))?;

        let valid = bcrypt::verify(current_password, &password_hash)
            .map_err(|_| anyhow::anyhow!("Current password incorrect"))?;
        if !valid {
            anyhow::bail!("Current password incorrect");
        }

        let new_hash = bcrypt::hash(new_password, 12)?;
        sqlx::query(&format!(
            "UPDATE \"{schema}\".users SET password_hash = $1, updated_at = NOW() WHERE id = $2"
        ))
        .bind(&new_hash)
        .bind(user_id)
        .execute(pool)
        .await?;

        // Revoke all refresh tokens to force re-login
        sqlx::query(&format!(
            "UPDATE \"{schema}\".refresh_tokens SET revoked = TRUE WHERE user_id = $1"
        ))
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// List all pending (unused) invitations for a facility.
    pub async fn list_pending_invitations(
        pool: &PgPool,
        facility: &str,
    ) -> anyhow::Result<Vec<PendingInvitationDto>> {
        let schema = schema_name(facility);

        let rows = sqlx::query(&format!(
            r#"
            SELECT
                it.id,
                it.email,
                it.role::TEXT as role,
                it.invited_by,
                u.first_name,
                u.last_name,
                it.created_at,
                it.expires_at
            FROM "{schema}".invitation_tokens it
            LEFT JOIN "{schema}".users u ON it.invited_by = u.id
            WHERE it.used = FALSE AND it.expires_at > NOW()
            ORDER BY it.created_at DESC
            "#
        ))
        .fetch_all(pool)
        .await?;

        let invitations = rows
            .into_iter()
            .map(|row| {
                let role_str: String = row.get("role");
                let invited_by_id: Option<Uuid> = row.get("invited_by");
                let first_name: Option<String> = row.get("first_name");
                let last_name: Option<String> = row.get("last_name");

                let invited_by_name = match (first_name, last_name) {
                    (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
                    _ => None,
                };

                PendingInvitationDto {
                    id: row.get("id"),
                    email: row.get("email"),
                    role: role_str.parse().unwrap_or(UserRole::Parent),
                    invited_by_id,
                    invited_by_name,
                    created_at: row.get("created_at"),
                    expires_at: row.get("expires_at"),
                }
            })
            .collect();

        Ok(invitations)
    }

    /// Delete a pending invitation by ID (only if not yet used).
    pub async fn delete_invitation(
        pool: &PgPool,
        facility: &str,
        invitation_id: Uuid,
    ) -> anyhow::Result<bool> {
        let schema = schema_name(facility);

        let result = sqlx::query(&format!(
            "DELETE FROM \"{schema}\".invitation_tokens WHERE id = $1 AND used = FALSE"
        ))
        .bind(invitation_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_url_uses_facility_subdomain() {
        assert_eq!(
            build_facility_invite_url("https://unifiedcare.app", "sunrise-clinic", "tok"),
            "https://sunrise-clinic.unifiedcare.app/register?token=tok"
        );
        assert_eq!(
            build_facility_reset_url("unifiedcare.app", "sunrise-clinic", "tok"),
            "https://sunrise-clinic.unifiedcare.app/reset-password?token=tok"
        );
    }

    #[test]
    fn random_tokens_are_distinct_and_sized() {
        let a = random_token(48);
        let b = random_token(48);
        assert_eq!(a.len(), 48);
        assert_ne!(a, b);
    }
}
