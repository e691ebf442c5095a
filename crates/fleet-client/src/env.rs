//! Connection parameters read from the process environment

use thiserror::Error;
use url::Url;

/// Backend base URL
pub const VAR_AUTOMATION_URL: &str = "FG_AUTOMATION_URL";
/// Pre-shared automation token exchanged for a bearer token
pub const VAR_AUTOMATION_TOKEN: &str = "FG_AUTOMATION_TOKEN";
/// API URL written into the provisioning image
pub const VAR_API_URL: &str = "FG_API_URL";
/// MQTT broker host written into the provisioning image
pub const VAR_MQTT_HOST: &str = "FG_MQTT_HOST";
/// MQTT broker port written into the provisioning image
pub const VAR_MQTT_PORT: &str = "FG_MQTT_PORT";
/// Serial device the flashing tool talks to
pub const VAR_SERIAL_DEVICE: &str = "SERIAL_DEVICE";

/// Serial device used when `SERIAL_DEVICE` is unset
pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/ttyUSB0";

const REQUIRED: [&str; 5] = [
    VAR_AUTOMATION_URL,
    VAR_AUTOMATION_TOKEN,
    VAR_API_URL,
    VAR_MQTT_HOST,
    VAR_MQTT_PORT,
];

/// Errors raised while loading the environment
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more mandatory variables are absent or empty
    #[error("missing required environment variable(s): {}; please export them", .0.join(", "))]
    MissingVariables(Vec<&'static str>),

    /// The backend URL does not parse
    #[error("{var} is not a valid URL: {reason}")]
    InvalidUrl { var: &'static str, reason: String },
}

/// Connection parameters for one run of the tool
#[derive(Clone, PartialEq, Eq)]
pub struct Environment {
    pub automation_url: Url,
    pub automation_token: String,
    pub api_url: String,
    pub mqtt_host: String,
    pub mqtt_port: String,
    pub serial_device: String,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("automation_url", &self.automation_url.as_str())
            .field("automation_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("mqtt_host", &self.mqtt_host)
            .field("mqtt_port", &self.mqtt_port)
            .field("serial_device", &self.serial_device)
            .finish()
    }
}

impl Environment {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    ///
    /// Every missing mandatory variable is reported at once, in declaration order.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let missing: Vec<&'static str> = REQUIRED
            .iter()
            .copied()
            .filter(|name| get(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVariables(missing));
        }

        let required = |name: &str| get(name).unwrap_or_default();

        let automation_url =
            Url::parse(&required(VAR_AUTOMATION_URL)).map_err(|e| ConfigError::InvalidUrl {
                var: VAR_AUTOMATION_URL,
                reason: e.to_string(),
            })?;

        Ok(Self {
            automation_url,
            automation_token: required(VAR_AUTOMATION_TOKEN),
            api_url: required(VAR_API_URL),
            mqtt_host: required(VAR_MQTT_HOST),
            mqtt_port: required(VAR_MQTT_PORT),
            serial_device: get(VAR_SERIAL_DEVICE)
                .unwrap_or_else(|| DEFAULT_SERIAL_DEVICE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn complete() -> HashMap<String, String> {
        vars(&[
            (VAR_AUTOMATION_URL, "https://backend.example.com/api"),
            (VAR_AUTOMATION_TOKEN, "secret"),
            (VAR_API_URL, "https://api.example.com"),
            (VAR_MQTT_HOST, "mqtt.example.com"),
            (VAR_MQTT_PORT, "8883"),
        ])
    }

    #[test]
    fn test_loads_complete_environment() {
        let env = complete();
        let loaded = Environment::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(loaded.automation_token, "secret");
        assert_eq!(loaded.mqtt_port, "8883");
        assert_eq!(loaded.serial_device, DEFAULT_SERIAL_DEVICE);
    }

    #[test]
    fn test_serial_device_override() {
        let mut env = complete();
        env.insert(VAR_SERIAL_DEVICE.into(), "/dev/ttyACM1".into());
        let loaded = Environment::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(loaded.serial_device, "/dev/ttyACM1");
    }

    #[test]
    fn test_reports_every_missing_variable() {
        let mut env = complete();
        env.remove(VAR_AUTOMATION_TOKEN);
        env.insert(VAR_MQTT_PORT.into(), String::new());
        let err = Environment::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingVariables(vec![VAR_AUTOMATION_TOKEN, VAR_MQTT_PORT])
        );
    }

    #[test]
    fn test_rejects_invalid_backend_url() {
        let mut env = complete();
        env.insert(VAR_AUTOMATION_URL.into(), "not a url".into());
        let err = Environment::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn test_debug_redacts_token() {
        let env = complete();
        let loaded = Environment::from_lookup(|k| env.get(k).cloned()).unwrap();
        let rendered = format!("{:?}", loaded);
        assert!(!rendered.contains("secret"));
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_reads_process_environment() {
        for (k, v) in complete() {
            std::env::set_var(k, v);
        }
        std::env::remove_var(VAR_SERIAL_DEVICE);

        let loaded = Environment::from_env().unwrap();
        assert_eq!(loaded.mqtt_host, "mqtt.example.com");

        for k in REQUIRED {
            std::env::remove_var(k);
        }
        assert!(Environment::from_env().is_err());
    }
}
