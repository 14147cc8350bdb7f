use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::{provision_facility_schema, schema_name},
    models::{
        facility::{Facility, PendingFacility},
        member::MemberKind,
    },
    services::counter,
};

/// Outcome of a successful facility approval.
pub struct FacilityApproval {
    pub facility: Facility,
    pub clinic_id: i64,
    pub service_name: String,
}

/// Lowercase, alphanumeric words joined by single hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_hyphen = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("facility");
    }
    slug
}

/// Find a slug not yet taken in the registry, suffixing -2, -3, ... as needed.
async fn unique_slug(pool: &PgPool, base: &str) -> anyhow::Result<String> {
    let mut candidate = base.to_string();
    let mut n = 1u32;
    loop {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM facilities WHERE slug = $1)")
                .bind(&candidate)
                .fetch_one(pool)
                .await?;
        if !taken {
            return Ok(candidate);
        }
        n += 1;
        if n > 500 {
            anyhow::bail!("Could not find a free slug for '{base}'");
        }
        candidate = format!("{base}-{n}");
    }
}

pub struct ApprovalService;

impl ApprovalService {
    /// Approve a pending facility.
    ///
    /// Schema provisioning is idempotent and runs before the transaction, so
    /// a retry after a crash picks up where it left off. The registry insert,
    /// clinic-id increment, first clinic-service row, and pending-row delete
    /// then commit or roll back as one unit: a lost race on the pending row
    /// aborts everything, and the counter never burns an id for an approval
    /// that did not land.
    pub async fn approve_facility(
        pool: &PgPool,
        pending_id: Uuid,
    ) -> anyhow::Result<FacilityApproval> {
        let pending: PendingFacility =
            sqlx::query_as("SELECT * FROM pending_facilities WHERE id = $1")
                .bind(pending_id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Pending facility not found"))?;

        if pending.name.trim().is_empty()
            || pending.email.trim().is_empty()
            || pending.phone.trim().is_empty()
        {
            anyhow::bail!("Pending application is missing name, email or phone");
        }

        let email_taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM facilities WHERE email = $1)")
                .bind(&pending.email)
                .fetch_one(pool)
                .await?;
        if email_taken {
            anyhow::bail!(
                "A facility with email {} already exists",
                pending.email
            );
        }

        let slug = unique_slug(pool, &slugify(&pending.name)).await?;

        provision_facility_schema(pool, &slug).await?;

        let mut tx = pool.begin().await?;

        let facility: Facility = sqlx::query_as(
            "INSERT INTO facilities (slug, name, email, phone, address, description, therapy_service)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(&slug)
        .bind(&pending.name)
        .bind(&pending.email)
        .bind(&pending.phone)
        .bind(&pending.address)
        .bind(&pending.description)
        .bind(&pending.therapy_type)
        .fetch_one(&mut *tx)
        .await?;

        let clinic_id = counter::next_clinic_id(&mut *tx).await?;

        let service_name = pending
            .therapy_type
            .clone()
            .unwrap_or_else(|| "General therapy".to_string());
        let schema = schema_name(&slug);
        sqlx::query(&format!(
            "INSERT INTO \"{schema}\".clinic_services (clinic_id, name, description)
             VALUES ($1, $2, $3)"
        ))
        .bind(clinic_id)
        .bind(&service_name)
        .bind(&pending.description)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM pending_facilities WHERE id = $1")
            .bind(pending_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            anyhow::bail!("Pending facility was already processed");
        }

        tx.commit().await?;

        Ok(FacilityApproval {
            facility,
            clinic_id,
            service_name,
        })
    }

    /// Delete a pending facility application. Returns false if none matched.
    pub async fn reject_pending_facility(pool: &PgPool, pending_id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM pending_facilities WHERE id = $1")
            .bind(pending_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Approve a pending therapist or parent application: copy the row into
    /// the approved table with a fresh timestamp, then delete it from the
    /// matching pending table only. One transaction; a lost race aborts both.
    ///
    /// Returns the approved applicant's email.
    pub async fn approve_member(
        pool: &PgPool,
        facility: &str,
        pending_id: Uuid,
        kind: MemberKind,
    ) -> anyhow::Result<String> {
        let schema = schema_name(facility);
        let pending_table = kind.pending_table();
        let approved_table = kind.approved_table();
        let extra_column = match kind {
            MemberKind::Therapist => "specialization",
            MemberKind::Parent => "special_needs",
        };

        let mut tx = pool.begin().await?;

        let email: Option<String> = sqlx::query_scalar(&format!(
            "INSERT INTO \"{schema}\".{approved_table}
                 (first_name, last_name, email, phone, address, therapy_type, {extra_column}, created_at)
             SELECT first_name, last_name, email, phone, address, therapy_type, {extra_column}, NOW()
             FROM \"{schema}\".{pending_table} WHERE id = $1
             RETURNING email"
        ))
        .bind(pending_id)
        .fetch_optional(&mut *tx)
        .await?;

        let email = email.ok_or_else(|| anyhow::anyhow!("Pending {kind} application not found"))?;

        let deleted = sqlx::query(&format!(
            "DELETE FROM \"{schema}\".{pending_table} WHERE id = $1"
        ))
        .bind(pending_id)
        .execute(&mut *tx)
        .await?;
        if deleted.rows_affected() == 0 {
            anyhow::bail!("Pending {kind} application was already processed");
        }

        tx.commit().await?;
        Ok(email)
    }

    /// Delete a pending member application from the matching kind's table.
    pub async fn reject_member(
        pool: &PgPool,
        facility: &str,
        pending_id: Uuid,
        kind: MemberKind,
    ) -> anyhow::Result<bool> {
        let schema = schema_name(facility);
        let result = sqlx::query(&format!(
            "DELETE FROM \"{schema}\".{} WHERE id = $1",
            kind.pending_table()
        ))
        .bind(pending_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation_and_case() {
        assert_eq!(slugify("Sunrise Therapy Center"), "sunrise-therapy-center");
        assert_eq!(slugify("  Ängel & Co.  "), "ngel-co");
        assert_eq!(slugify("ABC---123"), "abc-123");
    }

    #[test]
    fn slugify_never_returns_empty() {
        assert_eq!(slugify("***"), "facility");
        assert_eq!(slugify(""), "facility");
    }

    #[test]
    fn slugify_strips_trailing_hyphen() {
        assert_eq!(slugify("Clinic!"), "clinic");
        assert!(!slugify("a b c ").ends_with('-'));
    }
}
