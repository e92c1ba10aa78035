pub mod auth;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod middleware;
pub mod registrations;
pub mod sessions;
pub mod validate;
