//! HTTP surface: router, endpoints and authentication

pub mod middleware;
pub mod routes;

pub use routes::build_router;
