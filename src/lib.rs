//! Supervised prefork HTTP worker library

pub mod app;
pub mod cluster;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod store;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::{ExitOutcome, Shutdown};
