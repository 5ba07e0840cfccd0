//! HTTP gateway: management API plus the inbound webhook endpoint.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
