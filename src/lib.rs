//! # rankgate
//!
//! HTTP retrieval gateway over [`rankgate_core`]: environment
//! configuration, the axum surface, and the in-process source adapters
//! the default binary wires up.

pub mod config;
pub mod server;
pub mod sources;

pub use config::ServerConfig;
pub use server::{build_router, run_server, AppState};
pub use sources::StaticSource;
