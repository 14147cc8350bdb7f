pub mod approval;
pub mod auth;
pub mod clinic_mirror;
pub mod counter;
pub mod email;
pub mod metrics;
pub mod stats;
