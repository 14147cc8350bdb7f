use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use redis::Client as RedisClient;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use unifiedcare_api::{
    config::Config,
    db,
    middleware::auth::JwtSecret,
    routes,
    services::{self, clinic_mirror::ClinicMirror, email::EmailService},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let config = Arc::new(config);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    db::migrate_all_existing_facilities(&pool).await?;
    info!("Database connected and migrations applied");

    let redis_client = RedisClient::open(config.redis_url.as_str())?;
    let redis_conn = redis_client.get_multiplexed_async_connection().await?;
    info!("Redis connected");

    let email = EmailService::new(&config).map(Arc::new);
    if email.is_some() {
        info!("SMTP email service configured");
    } else {
        info!("SMTP not configured — email features disabled");
    }

    let clinic_mirror = Arc::new(ClinicMirror::new(config.clinic_mirror_url.clone()));
    if clinic_mirror.is_configured() {
        info!("Clinic mirror configured");
    }

    services::metrics::start(pool.clone());

    let state = AppState {
        db: pool,
        redis: redis_conn,
        config: config.clone(),
        email,
        clinic_mirror,
    };

    // Build CORS: allow the app base domain and its subdomains (facility subdomains).
    // In development (localhost), all origins are allowed.
    let base_url = config.app_base_url.clone();
    let cors_origin = {
        let base = base_url.clone();
        AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            let o = match origin.to_str() {
                Ok(s) => s,
                Err(_) => return false,
            };
            // Always allow localhost / 127.0.0.1 for local development
            if o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") {
                return true;
            }
            // Exact match of app_base_url
            if o == base {
                return true;
            }
            // Subdomain match: extract domain portion from base URL and allow *.domain
            if let Some(idx) = base.find("://") {
                let after_scheme = &base[idx + 3..];
                let domain = after_scheme.split('/').next().unwrap_or(after_scheme);
                let domain_clean = domain.split(':').next().unwrap_or(domain);
                if o.contains(&format!(".{domain_clean}")) {
                    return true;
                }
            }
            false
        })
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static("x-facility"),
            header::HeaderName::from_static("x-platform-key"),
        ]))
        .allow_origin(cors_origin);

    let jwt_secret = JwtSecret(config.jwt_secret.clone());

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        .route("/announcement", get(routes::announcements::get_announcement))
        // Public applications
        .route("/apply/facility", post(routes::apply::submit_facility))
        .route("/apply/check-slug", get(routes::apply::check_slug))
        .route("/apply/member", post(routes::apply::submit_member))
        // Auth
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh_token))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/change-password", post(routes::auth::change_password))
        .route("/auth/forgot-password", post(routes::auth::forgot_password))
        .route("/auth/reset-password", post(routes::auth::reset_password))
        .route("/auth/invite", post(routes::auth::invite_user))
        .route("/auth/invitations", get(routes::auth::list_pending_invitations))
        .route("/auth/invitations/{id}", delete(routes::auth::delete_invitation))
        .route("/auth/register", post(routes::auth::register_from_invite))
        // Facility self-service
        .route(
            "/facility/profile",
            get(routes::facilities::get_profile).put(routes::facilities::update_profile),
        )
        // Members
        .route("/members/therapists", get(routes::members::list_therapists))
        .route("/members/parents", get(routes::members::list_parents))
        .route("/members/pending", get(routes::members::list_pending_members))
        .route("/members/pending/{id}/approve", post(routes::members::approve_member))
        .route("/members/pending/{id}/reject", post(routes::members::reject_member))
        // Clinic services
        .route(
            "/clinic-services",
            get(routes::clinic_services::list_clinic_services)
                .post(routes::clinic_services::create_clinic_service),
        )
        .route(
            "/clinic-services/{id}",
            put(routes::clinic_services::update_clinic_service)
                .delete(routes::clinic_services::delete_clinic_service),
        )
        // Therapy sessions
        .route(
            "/sessions",
            get(routes::sessions::list_sessions).post(routes::sessions::record_session),
        )
        // Messages
        .route(
            "/messages",
            get(routes::messages::list_messages).post(routes::messages::send_message),
        )
        .route("/messages/conversation/{user_id}", get(routes::messages::get_conversation))
        .route("/messages/{id}/read", post(routes::messages::mark_read))
        // Dashboard
        .route("/stats/overview", get(routes::stats::facility_overview))
        // Platform (developer console)
        .route("/platform/stats", get(routes::stats::platform_overview))
        .route("/platform/pending-facilities", get(routes::pending::list_pending_facilities))
        .route("/platform/pending-facilities/{id}/approve", post(routes::pending::approve_facility))
        .route("/platform/pending-facilities/{id}/reject", post(routes::pending::reject_facility))
        .route("/platform/facilities", get(routes::facilities::list_facilities))
        .route(
            "/platform/facilities/{slug}",
            get(routes::facilities::get_facility)
                .put(routes::facilities::update_facility)
                .delete(routes::facilities::delete_facility),
        )
        .route("/platform/facilities/{slug}/invite", post(routes::facilities::invite_facility_user))
        .route("/platform/developers", get(routes::developers::list_developers))
        .route(
            "/platform/developers/{email}",
            get(routes::developers::get_developer).put(routes::developers::upsert_developer),
        )
        .route(
            "/platform/announcement",
            put(routes::announcements::set_announcement)
                .delete(routes::announcements::delete_announcement),
        )
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("UnifiedCare API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
