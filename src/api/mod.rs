// src/api/mod.rs
// Thin HTTP adapter over the core services

pub mod error;
pub mod extract;
pub mod http;
pub mod router;

pub use error::ApiError;
pub use router::build_router;
