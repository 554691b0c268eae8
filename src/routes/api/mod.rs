pub mod auth;
pub mod oauth;
pub mod rbac;
mod router;

pub use router::router;
