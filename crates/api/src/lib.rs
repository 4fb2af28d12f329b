//! imgflow API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! connection registry, progress subscriber) so integration tests and the
//! binary entrypoint can both access them.

pub mod config;
pub mod error;
pub mod progress;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
