// Dataset names
pub const LOG_DATASET: &str = "CF Logs";
pub const METRICS_DATASET: &str = "CF Metrics";
pub const ERROR_DATASET: &str = "CF Errors";

// Field name prefixes, one per variant
pub const HTTP_PREFIX: &str = "http";
pub const LOG_PREFIX: &str = "log";
pub const CONTAINER_METRIC_PREFIX: &str = "cm";
pub const COUNTER_EVENT_PREFIX: &str = "ce";
pub const VALUE_METRIC_PREFIX: &str = "valuem";
pub const TAG_PREFIX: &str = "tag_";

/// Field carrying an error notice payload
pub const ERROR_NOTICE_FIELD: &str = "errorField";
/// Field carrying a transport error message
pub const TRANSPORT_ERROR_FIELD: &str = "error";

/// Seconds between statistics reports
pub const DEFAULT_REPORTING_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_SUBSCRIPTION_ID: &str = "honeycomb";
pub const DEFAULT_API_HOST: &str = "https://api.honeycomb.io";
pub const DEFAULT_PORT: u16 = 8080;

/// Health check response body
pub const HEALTHY_BODY: &str = "I'm healthy";

/// Delay before the firehose source reconnects after a dropped stream
pub const RECONNECT_DELAY_SECS: u64 = 5;

// Process identity fields attached to every outbound event
pub const NOZZLE_APP_ID_FIELD: &str = "hnyNozzleAppID";
pub const NOZZLE_INSTANCE_ID_FIELD: &str = "hnyNozzleInstanceID";
pub const NOZZLE_VERSION_FIELD: &str = "hnyNozzleVersion";
pub const NOZZLE_IN_FLIGHT_FIELD: &str = "hnyNozzleInFlight";
pub const NOZZLE_MEM_FIELD: &str = "hnyNozzleMem";
