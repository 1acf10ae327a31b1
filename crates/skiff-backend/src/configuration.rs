use config::{Config, Environment};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::error::{to_env_var, ConfigError};

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Comma-separated list of allowed CORS origins
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Failed to parse socket address")
    }

    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct AlephSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_post_type")]
    pub agent_post_type: String,
    /// Address of the account publishing agent records
    pub sender_address: String,
    /// Hex-encoded signing key of the sender account
    pub sender_key: String,
}

#[derive(Debug, Deserialize)]
pub struct BackendSettings {
    /// Shared password authorizing the subscription backend
    pub password: String,
    /// Hex-encoded 32-byte master key sealing agent secrets
    pub master_key: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub aleph: AlephSettings,
    pub backend: BackendSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("SKIFF")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(ConfigError::Other)?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        // Surface missing required fields as the env var the operator must set
        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8100
}

fn default_allowed_origins() -> String {
    "https://chat.skiff.network,http://localhost:9000".to_string()
}

fn default_api_url() -> String {
    "https://api2.aleph.im".to_string()
}

fn default_gateway_url() -> String {
    "https://ipfs.aleph.cloud".to_string()
}

fn default_channel() -> String {
    "skiff".to_string()
}

fn default_post_type() -> String {
    "skiff-agent".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("SKIFF_") {
                env::remove_var(&key);
            }
        }
    }

    fn set_required() {
        env::set_var("SKIFF_ALEPH__SENDER_ADDRESS", "0xsender");
        env::set_var("SKIFF_ALEPH__SENDER_KEY", "deadbeef");
        env::set_var("SKIFF_BACKEND__PASSWORD", "hunter2");
        env::set_var("SKIFF_BACKEND__MASTER_KEY", &"ab".repeat(32));
    }

    #[test]
    #[serial]
    fn test_missing_required_field_names_the_env_var() {
        clean_env();

        let err = Settings::new().unwrap_err();
        let message = err.to_string();
        assert!(
            message.contains("SKIFF_"),
            "unexpected error message: {}",
            message
        );
    }

    #[test]
    #[serial]
    fn test_defaults_with_required_fields() {
        clean_env();
        set_required();

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8100);
        assert_eq!(settings.aleph.api_url, "https://api2.aleph.im");
        assert_eq!(settings.aleph.channel, "skiff");
        assert_eq!(settings.aleph.agent_post_type, "skiff-agent");
        assert_eq!(settings.backend.password, "hunter2");

        clean_env();
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        set_required();
        env::set_var("SKIFF_SERVER__PORT", "9100");
        env::set_var("SKIFF_ALEPH__CHANNEL", "skiff-staging");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.aleph.channel, "skiff-staging");

        clean_env();
    }

    #[test]
    fn test_origin_list_parsing() {
        let settings = ServerSettings::default();
        assert_eq!(
            settings.origins(),
            vec![
                "https://chat.skiff.network".to_string(),
                "http://localhost:9000".to_string()
            ]
        );
    }
}
