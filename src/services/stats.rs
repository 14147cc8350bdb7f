use chrono::{DateTime, Datelike, Utc};
use sqlx::PgPool;
use tracing::warn;

use crate::db::tenant::schema_name;

/// Twelve per-month counts of records created in `year`.
///
/// Records without a usable timestamp are skipped with a warning; they never
/// fail the aggregation.
pub fn monthly_counts(timestamps: &[Option<DateTime<Utc>>], year: i32) -> [u32; 12] {
    let mut counts = [0u32; 12];
    for ts in timestamps {
        match ts {
            Some(t) if t.year() == year => {
                counts[t.month0() as usize] += 1;
            }
            Some(_) => {}
            None => warn!("Skipping record without creation timestamp"),
        }
    }
    counts
}

/// Twelve per-month averages of session duration (minutes) for `year`.
///
/// Months with zero contributing sessions report exactly 0.0 — the division
/// is guarded so no month ever yields NaN.
pub fn monthly_avg_duration(sessions: &[(Option<DateTime<Utc>>, f64)], year: i32) -> [f64; 12] {
    let mut sums = [0f64; 12];
    let mut counts = [0u32; 12];

    for (ts, duration) in sessions {
        match ts {
            Some(t) if t.year() == year => {
                let m = t.month0() as usize;
                sums[m] += duration;
                counts[m] += 1;
            }
            Some(_) => {}
            None => warn!("Skipping session without timestamp"),
        }
    }

    let mut averages = [0f64; 12];
    for m in 0..12 {
        if counts[m] > 0 {
            averages[m] = sums[m] / counts[m] as f64;
        }
    }
    averages
}

/// Sorted union of the years present across therapist and parent creation
/// timestamps. Records without a timestamp contribute nothing.
pub fn available_years(
    therapists: &[Option<DateTime<Utc>>],
    parents: &[Option<DateTime<Utc>>],
) -> Vec<i32> {
    let mut years: Vec<i32> = therapists
        .iter()
        .chain(parents.iter())
        .filter_map(|ts| ts.map(|t| t.year()))
        .collect();
    years.sort_unstable();
    years.dedup();
    years
}

/// The year a dashboard opens on: the current year when present in the set,
/// otherwise the earliest available year. None when no records exist at all.
pub fn default_year(years: &[i32], current: i32) -> Option<i32> {
    if years.contains(&current) {
        Some(current)
    } else {
        years.first().copied()
    }
}

/// Everything the facility dashboard chart needs for one year.
#[derive(Debug, serde::Serialize)]
pub struct FacilityStats {
    pub year: i32,
    pub years: Vec<i32>,
    pub therapists_per_month: [u32; 12],
    pub parents_per_month: [u32; 12],
    pub avg_session_minutes: [f64; 12],
}

/// Fetch a facility's raw records and aggregate them for `requested_year`
/// (or the default year when none is requested).
pub async fn facility_stats(
    pool: &PgPool,
    slug: &str,
    requested_year: Option<i32>,
) -> anyhow::Result<FacilityStats> {
    let schema = schema_name(slug);

    let therapists: Vec<Option<DateTime<Utc>>> = sqlx::query_scalar(&format!(
        "SELECT created_at FROM \"{schema}\".therapists"
    ))
    .fetch_all(pool)
    .await?;

    let parents: Vec<Option<DateTime<Utc>>> = sqlx::query_scalar(&format!(
        "SELECT created_at FROM \"{schema}\".parents"
    ))
    .fetch_all(pool)
    .await?;

    let sessions: Vec<(Option<DateTime<Utc>>, f64)> = sqlx::query_as(&format!(
        "SELECT COALESCE(session_date::TIMESTAMPTZ, created_at), duration_minutes
         FROM \"{schema}\".therapy_sessions"
    ))
    .fetch_all(pool)
    .await?;

    let years = available_years(&therapists, &parents);
    let current = Utc::now().year();
    let year = requested_year
        .or_else(|| default_year(&years, current))
        .unwrap_or(current);

    Ok(FacilityStats {
        year,
        years,
        therapists_per_month: monthly_counts(&therapists, year),
        parents_per_month: monthly_counts(&parents, year),
        avg_session_minutes: monthly_avg_duration(&sessions, year),
    })
}

/// Platform-wide totals for the developer dashboard.
#[derive(Debug, serde::Serialize)]
pub struct PlatformStats {
    pub active_facilities: i64,
    pub pending_facilities: i64,
    pub total_therapists: i64,
    pub total_parents: i64,
    pub last_clinic_id: i64,
}

pub async fn platform_stats(pool: &PgPool) -> anyhow::Result<PlatformStats> {
    let active_facilities: i64 =
        sqlx::query_scalar("SELECT COUNT(*)::BIGINT FROM facilities WHERE is_active = TRUE")
            .fetch_one(pool)
            .await?;
    let pending_facilities: i64 =
        sqlx::query_scalar("SELECT COUNT(*)::BIGINT FROM pending_facilities")
            .fetch_one(pool)
            .await?;

    let slugs: Vec<String> =
        sqlx::query_scalar("SELECT slug FROM facilities WHERE is_active = TRUE")
            .fetch_all(pool)
            .await?;

    let mut total_therapists = 0i64;
    let mut total_parents = 0i64;
    for slug in &slugs {
        let schema = schema_name(slug);
        let t: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*)::BIGINT FROM \"{schema}\".therapists"
        ))
        .fetch_one(pool)
        .await
        .unwrap_or(0);
        let p: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*)::BIGINT FROM \"{schema}\".parents"
        ))
        .fetch_one(pool)
        .await
        .unwrap_or(0);
        total_therapists += t;
        total_parents += p;
    }

    let last_clinic_id = super::counter::current_clinic_id(pool).await?;

    Ok(PlatformStats {
        active_facilities,
        pending_facilities,
        total_therapists,
        total_parents,
        last_clinic_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap())
    }

    #[test]
    fn single_march_record_buckets_correctly() {
        let parents = vec![ts(2023, 3, 15)];
        assert_eq!(
            monthly_counts(&parents, 2023),
            [0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn counts_ignore_other_years_and_missing_timestamps() {
        let records = vec![ts(2023, 1, 1), ts(2022, 1, 1), None, ts(2023, 12, 31)];
        assert_eq!(
            monthly_counts(&records, 2023),
            [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn empty_months_average_zero_not_nan() {
        let sessions = vec![(ts(2023, 5, 2), 30.0), (ts(2023, 5, 9), 60.0)];
        let avgs = monthly_avg_duration(&sessions, 2023);
        assert_eq!(avgs[4], 45.0);
        for (m, avg) in avgs.iter().enumerate() {
            assert!(!avg.is_nan(), "month {m} is NaN");
            if m != 4 {
                assert_eq!(*avg, 0.0);
            }
        }
    }

    #[test]
    fn no_sessions_at_all_reports_all_zeros() {
        let avgs = monthly_avg_duration(&[], 2024);
        assert_eq!(avgs, [0.0; 12]);
    }

    #[test]
    fn year_set_is_exact_union() {
        let therapists = vec![ts(2021, 1, 1), ts(2023, 6, 1), None];
        let parents = vec![ts(2022, 2, 2), ts(2023, 3, 3)];
        assert_eq!(available_years(&therapists, &parents), vec![2021, 2022, 2023]);
    }

    #[test]
    fn default_year_prefers_current_then_minimum() {
        assert_eq!(default_year(&[2021, 2022, 2024], 2024), Some(2024));
        assert_eq!(default_year(&[2021, 2022], 2024), Some(2021));
        assert_eq!(default_year(&[], 2024), None);
    }
}
