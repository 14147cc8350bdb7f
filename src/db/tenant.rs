use sqlx::PgPool;

/// Provision a new per-facility PostgreSQL schema with all required tables.
/// Called when a pending facility is approved.
pub async fn provision_facility_schema(pool: &PgPool, slug: &str) -> anyhow::Result<()> {
    let schema = schema_name(slug);

    // --- Create schema ---
    sqlx::raw_sql(&format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\""))
        .execute(pool)
        .await?;

    // --- Enum: user_role ---
    sqlx::raw_sql(&format!(
        "DO $$ BEGIN
           IF NOT EXISTS (
             SELECT 1 FROM pg_type t
             JOIN pg_namespace n ON n.oid = t.typnamespace
             WHERE t.typname = 'user_role' AND n.nspname = '{schema}'
           ) THEN
             CREATE TYPE \"{schema}\".user_role AS ENUM
               ('facility_admin','therapist','parent');
           END IF;
         END $$"
    ))
    .execute(pool)
    .await?;

    // --- Users (facility logins) ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".users (
            id            UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            email         VARCHAR(255) UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            first_name    VARCHAR(128) NOT NULL,
            last_name     VARCHAR(128) NOT NULL,
            role          "{schema}".user_role NOT NULL DEFAULT 'parent',
            avatar_url    TEXT,
            is_active     BOOLEAN NOT NULL DEFAULT TRUE,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Refresh tokens ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".refresh_tokens (
            id         UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            user_id    UUID NOT NULL REFERENCES "{schema}".users(id) ON DELETE CASCADE,
            token_hash TEXT NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL,
            revoked    BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Invitation tokens ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".invitation_tokens (
            id         UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            email      VARCHAR(255) NOT NULL,
            token      TEXT UNIQUE NOT NULL,
            role       "{schema}".user_role NOT NULL DEFAULT 'parent',
            invited_by UUID REFERENCES "{schema}".users(id),
            used       BOOLEAN NOT NULL DEFAULT FALSE,
            expires_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Password reset tokens ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".password_reset_tokens (
            id         UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            user_id    UUID NOT NULL REFERENCES "{schema}".users(id) ON DELETE CASCADE,
            token      TEXT UNIQUE NOT NULL,
            used       BOOLEAN NOT NULL DEFAULT FALSE,
            expires_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Therapists (approved records) ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".therapists (
            id             UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            first_name     VARCHAR(128) NOT NULL,
            last_name      VARCHAR(128) NOT NULL,
            email          VARCHAR(255) NOT NULL,
            phone          VARCHAR(64),
            address        TEXT,
            therapy_type   VARCHAR(255),
            specialization VARCHAR(255),
            created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Parents (approved records) ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".parents (
            id            UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            first_name    VARCHAR(128) NOT NULL,
            last_name     VARCHAR(128) NOT NULL,
            email         VARCHAR(255) NOT NULL,
            phone         VARCHAR(64),
            address       TEXT,
            therapy_type  VARCHAR(255),
            special_needs VARCHAR(255),
            created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Pending therapist / parent applications ---
    for table in &["pending_therapists", "pending_parents"] {
        sqlx::raw_sql(&format!(
            r#"CREATE TABLE IF NOT EXISTS "{schema}"."{table}" (
                id            UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
                first_name    VARCHAR(128) NOT NULL,
                last_name     VARCHAR(128) NOT NULL,
                email         VARCHAR(255) NOT NULL,
                phone         VARCHAR(64),
                address       TEXT,
                therapy_type  VARCHAR(255),
                specialization VARCHAR(255),
                special_needs VARCHAR(255),
                created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#
        ))
        .execute(pool)
        .await?;
    }

    // --- Clinic services (clinic_id comes from public.clinic_id_counter) ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".clinic_services (
            id          UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            clinic_id   BIGINT UNIQUE NOT NULL,
            name        VARCHAR(255) NOT NULL,
            description TEXT,
            department  VARCHAR(128) NOT NULL DEFAULT 'general',
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Therapy sessions (feed the dashboard aggregator) ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".therapy_sessions (
            id               UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            therapist_email  VARCHAR(255),
            parent_email     VARCHAR(255),
            duration_minutes DOUBLE PRECISION NOT NULL CHECK (duration_minutes >= 0),
            session_date     DATE,
            created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Enum: message_type ---
    sqlx::raw_sql(&format!(
        "DO $$ BEGIN
           IF NOT EXISTS (
             SELECT 1 FROM pg_type t
             JOIN pg_namespace n ON n.oid = t.typnamespace
             WHERE t.typname = 'message_type' AND n.nspname = '{schema}'
           ) THEN
             CREATE TYPE \"{schema}\".message_type AS ENUM
               ('broadcast','individual');
           END IF;
         END $$"
    ))
    .execute(pool)
    .await?;

    // --- Messages ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".messages (
            id           UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            sender_id    UUID NOT NULL REFERENCES "{schema}".users(id),
            message_type "{schema}".message_type NOT NULL DEFAULT 'broadcast',
            recipient_id UUID REFERENCES "{schema}".users(id),
            subject      VARCHAR(255),
            content      TEXT NOT NULL,
            is_read      BOOLEAN NOT NULL DEFAULT FALSE,
            created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    sqlx::raw_sql(&format!(
        r#"CREATE INDEX IF NOT EXISTS messages_sender_idx    ON "{schema}".messages(sender_id);
           CREATE INDEX IF NOT EXISTS messages_recipient_idx ON "{schema}".messages(recipient_id);
           CREATE INDEX IF NOT EXISTS messages_created_idx   ON "{schema}".messages(created_at DESC);
           CREATE INDEX IF NOT EXISTS therapists_created_idx ON "{schema}".therapists(created_at);
           CREATE INDEX IF NOT EXISTS parents_created_idx    ON "{schema}".parents(created_at)"#
    ))
    .execute(pool)
    .await?;

    // --- updated_at trigger function ---
    sqlx::raw_sql(&format!(
        r#"CREATE OR REPLACE FUNCTION "{schema}".update_updated_at()
           RETURNS TRIGGER AS $fn$
           BEGIN NEW.updated_at = NOW(); RETURN NEW; END;
           $fn$ LANGUAGE plpgsql"#
    ))
    .execute(pool)
    .await?;

    // --- Triggers (one per table, idempotent via DROP IF EXISTS + CREATE) ---
    for table in &["users", "clinic_services", "messages"] {
        let trigger = format!("{table}_updated_at");
        sqlx::raw_sql(&format!(
            r#"DROP TRIGGER IF EXISTS "{trigger}" ON "{schema}"."{table}";
               CREATE TRIGGER "{trigger}"
               BEFORE UPDATE ON "{schema}"."{table}"
               FOR EACH ROW EXECUTE FUNCTION "{schema}".update_updated_at()"#
        ))
        .execute(pool)
        .await?;
    }

    tracing::info!("Provisioned facility schema: {schema}");
    Ok(())
}

/// Returns the PostgreSQL schema name for a given facility slug.
pub fn schema_name(slug: &str) -> String {
    format!("facility_{}", slug.to_lowercase().replace('-', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_name_normalizes_slug() {
        assert_eq!(schema_name("sunrise-clinic"), "facility_sunrise_clinic");
        assert_eq!(schema_name("Bright-Path-2"), "facility_bright_path_2");
    }
}
