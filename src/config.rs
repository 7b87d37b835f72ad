//! Environment configuration.
//!
//! Nozzle settings use the `HONEYCOMB_` prefix; process identity comes from the
//! variables the platform sets for every app instance.

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_API_HOST, DEFAULT_PORT, DEFAULT_REPORTING_INTERVAL_SECS, DEFAULT_SUBSCRIPTION_ID,
};
use crate::error::{NozzleError, Result};

const PREFIX: &str = "HONEYCOMB_";

/// How the nozzle obtains its firehose token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Discover UAA and the traffic controller through the Cloud Controller API.
    /// Also enables app name lookups.
    Api {
        url: String,
        username: String,
        password: String,
    },
    /// Direct UAA password grant; the firehose URL must be configured.
    Uaa {
        url: String,
        username: String,
        password: String,
        doppler_url: String,
    },
}

/// Identity of this nozzle instance, attached to every outbound event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub app_id: String,
    pub instance_id: String,
    pub version: String,
}

#[derive(Debug, Default, Deserialize)]
struct VcapApplication {
    application_id: Option<String>,
    application_version: Option<String>,
    instance_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NozzleConfig {
    pub write_key: String,
    pub sample_rate: u32,
    pub send_metrics: bool,
    pub skip_ssl: bool,
    pub api_url: Option<String>,
    pub api_username: String,
    pub api_password: String,
    pub uaa_url: Option<String>,
    pub uaa_username: String,
    pub uaa_password: String,
    pub doppler_url: Option<String>,
    pub api_host: String,
    pub subscription_id: String,
    pub reporting_interval_secs: u64,
    pub port: u16,
    pub process: ProcessIdentity,
    pub metrics_addr: Option<SocketAddr>,
    pub log_dir: Option<String>,
}

impl NozzleConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let nozzle = |key: &str| get(&format!("{PREFIX}{key}"));

        let sample_rate = match nozzle("SAMPLERATE") {
            Some(v) => parse_number::<u32>("HONEYCOMB_SAMPLERATE", &v)?.max(1),
            None => 1,
        };
        let reporting_interval_secs = match nozzle("REPORTINGINTERVAL") {
            Some(v) => parse_number::<u64>("HONEYCOMB_REPORTINGINTERVAL", &v)?,
            None => DEFAULT_REPORTING_INTERVAL_SECS,
        };
        if reporting_interval_secs == 0 {
            return Err(NozzleError::Config(
                "HONEYCOMB_REPORTINGINTERVAL must be at least 1 second".into(),
            ));
        }
        let port = match get("PORT") {
            Some(v) => parse_number::<u16>("PORT", &v)?,
            None => DEFAULT_PORT,
        };
        let metrics_addr = match get("NOZZLE_METRICS_ADDR") {
            Some(v) => Some(v.parse::<SocketAddr>().map_err(|e| {
                NozzleError::Config(format!("Invalid NOZZLE_METRICS_ADDR '{}': {}", v, e))
            })?),
            None => None,
        };

        Ok(Self {
            write_key: nozzle("WRITEKEY").unwrap_or_default(),
            sample_rate,
            send_metrics: parse_flag("HONEYCOMB_SENDMETRICS", nozzle("SENDMETRICS"))?,
            skip_ssl: parse_flag("HONEYCOMB_SKIPSSL", nozzle("SKIPSSL"))?,
            api_url: nozzle("APIURL"),
            api_username: nozzle("APIUSERNAME").unwrap_or_default(),
            api_password: nozzle("APIPASSWORD").unwrap_or_default(),
            uaa_url: nozzle("UAAURL"),
            uaa_username: nozzle("UAAUSERNAME").unwrap_or_default(),
            uaa_password: nozzle("UAAPASSWORD").unwrap_or_default(),
            doppler_url: nozzle("DOPPLERURL"),
            api_host: nozzle("APIHOST").unwrap_or_else(|| DEFAULT_API_HOST.to_string()),
            subscription_id: nozzle("SUBSCRIPTIONID")
                .unwrap_or_else(|| DEFAULT_SUBSCRIPTION_ID.to_string()),
            reporting_interval_secs,
            port,
            process: process_identity(&get)?,
            metrics_addr,
            log_dir: get("NOZZLE_LOG_DIR"),
        })
    }

    /// API credentials win over UAA credentials; having neither is fatal.
    pub fn auth_method(&self) -> Result<AuthMethod> {
        if let Some(url) = &self.api_url {
            return Ok(AuthMethod::Api {
                url: url.clone(),
                username: self.api_username.clone(),
                password: self.api_password.clone(),
            });
        }
        if let Some(url) = &self.uaa_url {
            let doppler_url = self.doppler_url.clone().ok_or_else(|| {
                NozzleError::Config("HONEYCOMB_DOPPLERURL is required with HONEYCOMB_UAAURL".into())
            })?;
            return Ok(AuthMethod::Uaa {
                url: url.clone(),
                username: self.uaa_username.clone(),
                password: self.uaa_password.clone(),
                doppler_url,
            });
        }
        Err(NozzleError::Config(
            "One of HONEYCOMB_APIURL or HONEYCOMB_UAAURL is required".into(),
        ))
    }

    pub fn require_write_key(&self) -> Result<&str> {
        if self.write_key.is_empty() {
            return Err(NozzleError::Config("HONEYCOMB_WRITEKEY is required".into()));
        }
        Ok(&self.write_key)
    }

    pub fn reporting_interval(&self) -> Duration {
        Duration::from_secs(self.reporting_interval_secs)
    }
}

fn process_identity<F>(get: &F) -> Result<ProcessIdentity>
where
    F: Fn(&str) -> Option<String>,
{
    let vcap: VcapApplication = match get("VCAP_APPLICATION") {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| NozzleError::Config(format!("Invalid VCAP_APPLICATION: {}", e)))?,
        None => VcapApplication::default(),
    };

    Ok(ProcessIdentity {
        app_id: vcap.application_id.unwrap_or_default(),
        instance_id: get("CF_INSTANCE_GUID")
            .or_else(|| get("INSTANCE_GUID"))
            .or(vcap.instance_id)
            .unwrap_or_default(),
        version: vcap.application_version.unwrap_or_default(),
    })
}

fn parse_flag(key: &str, value: Option<String>) -> Result<bool> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(NozzleError::Config(format!(
            "Invalid boolean for {}: '{}'",
            key, other
        ))),
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| NozzleError::Config(format!("Invalid number for {}: '{}' ({})", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<NozzleConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NozzleConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.sample_rate, 1);
        assert!(!config.send_metrics);
        assert!(!config.skip_ssl);
        assert_eq!(config.reporting_interval(), Duration::from_secs(60));
        assert_eq!(config.subscription_id, "honeycomb");
        assert_eq!(config.api_host, "https://api.honeycomb.io");
        assert_eq!(config.port, 8080);
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn test_nozzle_settings() {
        let config = config_from(&[
            ("HONEYCOMB_WRITEKEY", "abc123"),
            ("HONEYCOMB_SAMPLERATE", "20"),
            ("HONEYCOMB_SENDMETRICS", "true"),
            ("HONEYCOMB_SKIPSSL", "1"),
            ("HONEYCOMB_REPORTINGINTERVAL", "15"),
            ("PORT", "9000"),
            ("NOZZLE_METRICS_ADDR", "127.0.0.1:9898"),
        ])
        .unwrap();
        assert_eq!(config.require_write_key().unwrap(), "abc123");
        assert_eq!(config.sample_rate, 20);
        assert!(config.send_metrics);
        assert!(config.skip_ssl);
        assert_eq!(config.reporting_interval_secs, 15);
        assert_eq!(config.port, 9000);
        assert_eq!(config.metrics_addr, Some("127.0.0.1:9898".parse().unwrap()));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config_from(&[("HONEYCOMB_SENDMETRICS", "maybe")]).is_err());
        assert!(config_from(&[("HONEYCOMB_SAMPLERATE", "-1")]).is_err());
        assert!(config_from(&[("HONEYCOMB_REPORTINGINTERVAL", "0")]).is_err());
        assert!(config_from(&[("NOZZLE_METRICS_ADDR", "nowhere")]).is_err());
    }

    #[test]
    fn test_missing_write_key() {
        let config = config_from(&[]).unwrap();
        assert!(matches!(config.require_write_key(), Err(NozzleError::Config(_))));
    }

    #[test]
    fn test_api_auth_wins_over_uaa() {
        let config = config_from(&[
            ("HONEYCOMB_APIURL", "https://api.sys.example.com"),
            ("HONEYCOMB_APIUSERNAME", "nozzle"),
            ("HONEYCOMB_APIPASSWORD", "secret"),
            ("HONEYCOMB_UAAURL", "https://uaa.sys.example.com"),
        ])
        .unwrap();
        assert_eq!(
            config.auth_method().unwrap(),
            AuthMethod::Api {
                url: "https://api.sys.example.com".into(),
                username: "nozzle".into(),
                password: "secret".into(),
            }
        );
    }

    #[test]
    fn test_uaa_auth_requires_doppler_url() {
        let config = config_from(&[("HONEYCOMB_UAAURL", "https://uaa.sys.example.com")]).unwrap();
        assert!(config.auth_method().is_err());

        let config = config_from(&[
            ("HONEYCOMB_UAAURL", "https://uaa.sys.example.com"),
            ("HONEYCOMB_DOPPLERURL", "wss://doppler.sys.example.com:443"),
        ])
        .unwrap();
        assert!(matches!(config.auth_method().unwrap(), AuthMethod::Uaa { .. }));
    }

    #[test]
    fn test_no_auth_method_is_fatal() {
        let config = config_from(&[]).unwrap();
        assert!(matches!(config.auth_method(), Err(NozzleError::Config(_))));
    }

    #[test]
    fn test_process_identity_from_vcap() {
        let config = config_from(&[
            (
                "VCAP_APPLICATION",
                r#"{"application_id":"app-1","application_version":"v-9","instance_id":"inst-0"}"#,
            ),
            ("CF_INSTANCE_GUID", "guid-7"),
        ])
        .unwrap();
        assert_eq!(config.process.app_id, "app-1");
        assert_eq!(config.process.version, "v-9");
        assert_eq!(config.process.instance_id, "guid-7");
    }

    #[test]
    fn test_invalid_vcap_application() {
        assert!(config_from(&[("VCAP_APPLICATION", "{not json")]).is_err());
    }
}
