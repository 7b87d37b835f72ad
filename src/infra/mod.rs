pub mod auth;
pub mod cloud_controller;
pub mod dropsonde;
pub mod file_source;
pub mod firehose_source;
pub mod honeycomb_sink;
pub mod http_client;
pub mod memory_sink;
pub mod ndjson;
pub mod stdout_sink;
