//! HTTP boundary.
//!
//! All routes live under `/api/`. Routes that reach the inference service
//! pass the admission middleware first.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{serve_until_interrupted, start_api_server, ApiServer};
pub use types::ApiContext;
