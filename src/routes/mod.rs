pub mod announcements;
pub mod apply;
pub mod auth;
pub mod clinic_services;
pub mod developers;
pub mod facilities;
pub mod health;
pub mod members;
pub mod messages;
pub mod metrics;
pub mod pending;
pub mod sessions;
pub mod stats;
