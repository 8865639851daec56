use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub voice: VoiceConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Upstream voice-agent platform settings. The API key is optional at load
/// time; a backfill run refuses to start without it.
#[derive(Clone, Debug)]
pub struct VoiceConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub agent_id: String,
    pub page_size: u32,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub pacing_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub voice_api_key: Option<String>,
    pub voice_base_url: Option<String>,
    pub voice_agent_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://linehaul.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            voice: VoiceConfig {
                api_key: None,
                base_url: "https://api.elevenlabs.io".to_string(),
                agent_id: String::new(),
                page_size: 30,
                max_retries: 3,
                retry_base_delay_ms: 1_000,
                retry_max_delay_ms: 30_000,
                pacing_ms: 250,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    voice: Option<VoicePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct VoicePatch {
    api_key: Option<String>,
    base_url: Option<String>,
    agent_id: Option<String>,
    page_size: Option<u32>,
    max_retries: Option<u32>,
    retry_base_delay_ms: Option<u64>,
    retry_max_delay_ms: Option<u64>,
    pacing_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("linehaul.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn voice_api_key(&self) -> Option<&str> {
        self.voice.api_key.as_ref().map(|key| key.expose_secret())
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(voice) = patch.voice {
            if let Some(api_key_value) = voice.api_key {
                self.voice.api_key = Some(SecretString::from(api_key_value));
            }
            if let Some(base_url) = voice.base_url {
                self.voice.base_url = base_url;
            }
            if let Some(agent_id) = voice.agent_id {
                self.voice.agent_id = agent_id;
            }
            if let Some(page_size) = voice.page_size {
                self.voice.page_size = page_size;
            }
            if let Some(max_retries) = voice.max_retries {
                self.voice.max_retries = max_retries;
            }
            if let Some(retry_base_delay_ms) = voice.retry_base_delay_ms {
                self.voice.retry_base_delay_ms = retry_base_delay_ms;
            }
            if let Some(retry_max_delay_ms) = voice.retry_max_delay_ms {
                self.voice.retry_max_delay_ms = retry_max_delay_ms;
            }
            if let Some(pacing_ms) = voice.pacing_ms {
                self.voice.pacing_ms = pacing_ms;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = read_env("LINEHAUL_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(level) = read_env("LINEHAUL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = read_env("LINEHAUL_LOG_FORMAT") {
            self.logging.format = format.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "LINEHAUL_LOG_FORMAT".to_string(),
                value: format,
            })?;
        }
        if let Some(api_key_value) = read_env("LINEHAUL_VOICE_API_KEY") {
            self.voice.api_key = Some(SecretString::from(api_key_value));
        }
        if let Some(base_url) = read_env("LINEHAUL_VOICE_BASE_URL") {
            self.voice.base_url = base_url;
        }
        if let Some(agent_id) = read_env("LINEHAUL_VOICE_AGENT_ID") {
            self.voice.agent_id = agent_id;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(api_key_value) = overrides.voice_api_key {
            self.voice.api_key = Some(SecretString::from(api_key_value));
        }
        if let Some(base_url) = overrides.voice_base_url {
            self.voice.base_url = base_url;
        }
        if let Some(agent_id) = overrides.voice_agent_id {
            self.voice.agent_id = agent_id;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.voice.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("voice.base_url must not be empty".to_string()));
        }
        if self.voice.page_size == 0 {
            return Err(ConfigError::Validation("voice.page_size must be at least 1".to_string()));
        }
        if self.voice.max_retries == 0 {
            return Err(ConfigError::Validation(
                "voice.max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn resolve_config_path(requested: Option<&Path>) -> Option<PathBuf> {
    match requested {
        Some(path) if path.exists() => Some(path.to_path_buf()),
        Some(_) => None,
        None => {
            let default = PathBuf::from("linehaul.toml");
            default.exists().then_some(default)
        }
    }
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let contents = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&contents)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}
