//! HTTP API: server wiring, principal context, and request-level enforcement.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
