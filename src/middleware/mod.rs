pub mod auth;
pub mod platform;
pub mod rate_limit;
pub mod tenant;
