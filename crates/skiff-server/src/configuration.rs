use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Failed to parse socket address")
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelSettings {
    /// Catalog id of the model powering this agent
    #[serde(default = "default_model_id")]
    pub id: String,
    /// Completion endpoint override, e.g. a local deployment
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_max_tool_call_depth")]
    pub max_tool_call_depth: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        ModelSettings {
            id: default_model_id(),
            endpoint: None,
            system_prompt: default_system_prompt(),
            max_tool_call_depth: default_max_tool_call_depth(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub model: ModelSettings,
}

impl Settings {
    /// Layer environment variables (SKIFF_SERVER__PORT, SKIFF_MODEL__ID, ...)
    /// over the defaults
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("SKIFF")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_model_id() -> String {
    "NousResearch/Hermes-2-Pro-Llama-3-8B".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant".to_string()
}

fn default_max_tool_call_depth() -> usize {
    skiff::agent::DEFAULT_MAX_TOOL_CALL_DEPTH
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

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.model.id, "NousResearch/Hermes-2-Pro-Llama-3-8B");
        assert!(settings.model.endpoint.is_none());
        assert_eq!(settings.model.max_tool_call_depth, 3);
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("SKIFF_SERVER__PORT", "9000");
        env::set_var("SKIFF_MODEL__ID", "mistralai/Mistral-Nemo-Instruct-2407");
        env::set_var("SKIFF_MODEL__ENDPOINT", "http://localhost:8080/completion");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.model.id, "mistralai/Mistral-Nemo-Instruct-2407");
        assert_eq!(
            settings.model.endpoint.as_deref(),
            Some("http://localhost:8080/completion")
        );

        env::remove_var("SKIFF_SERVER__PORT");
        env::remove_var("SKIFF_MODEL__ID");
        env::remove_var("SKIFF_MODEL__ENDPOINT");
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }
}
