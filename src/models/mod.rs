pub mod announcement;
pub mod auth;
pub mod clinic;
pub mod developer;
pub mod facility;
pub mod member;
pub mod message;
pub mod session;
pub mod user;
