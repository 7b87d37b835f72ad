pub mod aggregator;
pub mod ports;
