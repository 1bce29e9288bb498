//! tug-daemon library target.
//!
//! Exposes the router, shared state, and scheduler for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod routes;
pub mod scheduler;
pub mod state;
