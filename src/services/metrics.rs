use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Gauge, GaugeVec,
};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::db::tenant::schema_name;

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "api_logins_total",
        "Login attempts by facility and status",
        &["facility", "status"]
    ).unwrap();

    pub static ref INVITATIONS_COUNTER: CounterVec = register_counter_vec!(
        "api_invitations_total",
        "Invitations sent by facility",
        &["facility"]
    ).unwrap();

    pub static ref PASSWORD_RESETS_COUNTER: CounterVec = register_counter_vec!(
        "api_password_resets_total",
        "Password reset requests by facility",
        &["facility"]
    ).unwrap();

    pub static ref MESSAGES_COUNTER: CounterVec = register_counter_vec!(
        "api_messages_sent_total",
        "Messages sent by facility",
        &["facility"]
    ).unwrap();

    pub static ref FACILITY_APPROVALS_COUNTER: Counter = register_counter!(
        "api_facility_approvals_total",
        "Facility applications approved"
    ).unwrap();

    pub static ref FACILITY_REJECTIONS_COUNTER: Counter = register_counter!(
        "api_facility_rejections_total",
        "Facility applications rejected"
    ).unwrap();

    pub static ref MEMBER_APPROVALS_COUNTER: CounterVec = register_counter_vec!(
        "api_member_approvals_total",
        "Member applications approved by facility and kind",
        &["facility", "kind"]
    ).unwrap();

    pub static ref APPLICATIONS_COUNTER: CounterVec = register_counter_vec!(
        "api_applications_total",
        "Public applications submitted by kind",
        &["kind"]
    ).unwrap();

    // ── Business metrics ────────────────────────────────────────────────────
    pub static ref USERS_GAUGE: GaugeVec = register_gauge_vec!(
        "unifiedcare_users_total",
        "Active user accounts by facility and role",
        &["facility", "role"]
    ).unwrap();

    pub static ref THERAPISTS_GAUGE: GaugeVec = register_gauge_vec!(
        "unifiedcare_therapists_total",
        "Approved therapists by facility",
        &["facility"]
    ).unwrap();

    pub static ref PARENTS_GAUGE: GaugeVec = register_gauge_vec!(
        "unifiedcare_parents_total",
        "Approved parents by facility",
        &["facility"]
    ).unwrap();

    pub static ref MESSAGES_GAUGE: GaugeVec = register_gauge_vec!(
        "unifiedcare_messages_total",
        "Total messages by facility",
        &["facility"]
    ).unwrap();

    pub static ref FACILITIES_GAUGE: Gauge = register_gauge!(
        "unifiedcare_facilities_active_total",
        "Active facilities"
    ).unwrap();

    pub static ref PENDING_FACILITIES_GAUGE: Gauge = register_gauge!(
        "unifiedcare_facilities_pending_total",
        "Facility applications awaiting review"
    ).unwrap();

    pub static ref LAST_CLINIC_ID_GAUGE: Gauge = register_gauge!(
        "unifiedcare_last_clinic_id",
        "Most recently issued clinic id"
    ).unwrap();
}

/// Spawn the background metrics collector (refreshes every 5 minutes).
pub fn start(pool: PgPool) {
    tokio::spawn(async move {
        // Initial collection on startup
        if let Err(e) = collect(&pool).await {
            warn!("Metrics: initial collection failed: {}", e);
        }
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
            if let Err(e) = collect(&pool).await {
                warn!("Metrics: collection failed: {}", e);
            }
        }
    });
}

async fn collect(pool: &PgPool) -> anyhow::Result<()> {
    let facilities: Vec<String> =
        sqlx::query_scalar("SELECT slug FROM public.facilities WHERE is_active = TRUE")
            .fetch_all(pool)
            .await?;

    FACILITIES_GAUGE.set(facilities.len() as f64);

    let pending: i64 = sqlx::query_scalar("SELECT COUNT(*)::BIGINT FROM pending_facilities")
        .fetch_one(pool)
        .await
        .unwrap_or(0);
    PENDING_FACILITIES_GAUGE.set(pending as f64);

    let last_id: i64 = super::counter::current_clinic_id(pool).await.unwrap_or(0);
    LAST_CLINIC_ID_GAUGE.set(last_id as f64);

    for slug in &facilities {
        let schema = schema_name(slug);

        // Users by role
        let user_counts: Vec<(String, i64)> = sqlx::query_as(&format!(
            r#"SELECT role::TEXT, COUNT(*)::BIGINT FROM "{schema}".users WHERE is_active = TRUE GROUP BY role"#
        ))
        .fetch_all(pool)
        .await
        .unwrap_or_default();

        for (role, count) in user_counts {
            USERS_GAUGE.with_label_values(&[slug, &role]).set(count as f64);
        }

        let therapists: i64 = sqlx::query_scalar(&format!(
            r#"SELECT COUNT(*)::BIGINT FROM "{schema}".therapists"#
        ))
        .fetch_one(pool)
        .await
        .unwrap_or(0);
        THERAPISTS_GAUGE.with_label_values(&[slug]).set(therapists as f64);

        let parents: i64 = sqlx::query_scalar(&format!(
            r#"SELECT COUNT(*)::BIGINT FROM "{schema}".parents"#
        ))
        .fetch_one(pool)
        .await
        .unwrap_or(0);
        PARENTS_GAUGE.with_label_values(&[slug]).set(parents as f64);

        let messages: i64 = sqlx::query_scalar(&format!(
            r#"SELECT COUNT(*)::BIGINT FROM "{schema}".messages"#
        ))
        .fetch_one(pool)
        .await
        .unwrap_or(0);
        MESSAGES_GAUGE.with_label_values(&[slug]).set(messages as f64);
    }

    info!("Metrics: collected for {} facility(ies)", facilities.len());
    Ok(())
}
