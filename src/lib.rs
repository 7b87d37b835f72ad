pub mod app;
pub mod cache;
pub mod config;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod infra;
pub mod observability;
pub mod record;
pub mod server;
pub mod translate;
