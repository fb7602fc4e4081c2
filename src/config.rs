use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;
/// Default limit for session establishment
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default limit for a single channel step
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(300);
/// Default chunk size for streaming transfers (64KB)
pub const DEFAULT_IO_SIZE: usize = 65_536;

const ENV_PREFIX: &str = "SFTP_CLIENT_";

/// Errors raised while loading or validating a [`ConnectionConfig`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed connection config")]
    Parse(#[from] serde_json::Error),
    #[error("missing setting {0}")]
    Missing(String),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("invalid connection config: {0}")]
    Invalid(&'static str),
}

/// Connection parameters for the remote file server.
///
/// Immutable once handed to a client: fields are private and the `with_*`
/// methods consume the value.
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    username: String,
    #[serde(alias = "password", deserialize_with = "deserialize_secret")]
    credential: SecretString,
    #[serde(
        rename = "connect_timeout_ms",
        default = "default_connect_timeout",
        deserialize_with = "deserialize_millis"
    )]
    connect_timeout: Duration,
    #[serde(
        rename = "operation_timeout_ms",
        default = "default_operation_timeout",
        deserialize_with = "deserialize_millis"
    )]
    operation_timeout: Duration,
    #[serde(default = "default_io_size")]
    io_size: usize,
}

impl Clone for ConnectionConfig {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            credential: SecretString::from(self.credential.expose_secret().to_string()),
            connect_timeout: self.connect_timeout,
            operation_timeout: self.operation_timeout,
            io_size: self.io_size,
        }
    }
}

impl ConnectionConfig {
    /// Creates a configuration with default timeouts and chunk size
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            credential: SecretString::from(Into::<String>::into(credential)),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            io_size: DEFAULT_IO_SIZE,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_io_size(mut self, io_size: usize) -> Self {
        self.io_size = io_size;
        self
    }

    /// Parses a JSON document such as
    ///
    /// ```json
    /// { "host": "files.example.com", "port": 22, "username": "app",
    ///   "password": "secret", "connect_timeout_ms": 10000 }
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Reads `SFTP_CLIENT_HOST`, `SFTP_CLIENT_PORT`, `SFTP_CLIENT_USERNAME`,
    /// `SFTP_CLIENT_PASSWORD`, `SFTP_CLIENT_CONNECT_TIMEOUT_MS` and
    /// `SFTP_CLIENT_OPERATION_TIMEOUT_MS` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ConnectionConfig::from_env`] with a caller-supplied lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let require = |name: &str| get(name).ok_or_else(|| ConfigError::Missing(format!("{ENV_PREFIX}{name}")));

        let port = match get("PORT") {
            Some(raw) => parse_number::<u16>("PORT", &raw)?,
            None => DEFAULT_PORT,
        };
        let mut config = Self::new(require("HOST")?, port, require("USERNAME")?, require("PASSWORD")?);
        if let Some(raw) = get("CONNECT_TIMEOUT_MS") {
            config.connect_timeout = Duration::from_millis(parse_number("CONNECT_TIMEOUT_MS", &raw)?);
        }
        if let Some(raw) = get("OPERATION_TIMEOUT_MS") {
            config.operation_timeout =
                Duration::from_millis(parse_number("OPERATION_TIMEOUT_MS", &raw)?);
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants every connector relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty"));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::Invalid("username must not be empty"));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must not be zero"));
        }
        if self.connect_timeout.is_zero() || self.operation_timeout.is_zero() {
            return Err(ConfigError::Invalid("timeouts must be positive"));
        }
        if self.io_size == 0 {
            return Err(ConfigError::Invalid("io_size must be positive"));
        }
        Ok(())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn credential(&self) -> &str {
        self.credential.expose_secret()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    pub fn io_size(&self) -> usize {
        self.io_size
    }

    /// `host:port`, used in log lines and error messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: format!("{ENV_PREFIX}{name}"),
        value: raw.to_string(),
    })
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_operation_timeout() -> Duration {
    DEFAULT_OPERATION_TIMEOUT
}

fn default_io_size() -> usize {
    DEFAULT_IO_SIZE
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn json_applies_defaults() {
        let config = ConnectionConfig::from_json_str(
            r#"{"host": "files.local", "username": "app", "password": "pw"}"#,
        )
        .unwrap();
        assert_eq!(config.host(), "files.local");
        assert_eq!(config.port(), DEFAULT_PORT);
        assert_eq!(config.credential(), "pw");
        assert_eq!(config.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.operation_timeout(), DEFAULT_OPERATION_TIMEOUT);
        assert_eq!(config.io_size(), DEFAULT_IO_SIZE);
    }

    #[test]
    fn json_reads_millisecond_timeouts() {
        let config = ConnectionConfig::from_json_str(
            r#"{"host": "h", "port": 2222, "username": "u", "credential": "c",
                "connect_timeout_ms": 1500, "operation_timeout_ms": 60000, "io_size": 1024}"#,
        )
        .unwrap();
        assert_eq!(config.port(), 2222);
        assert_eq!(config.connect_timeout(), Duration::from_millis(1500));
        assert_eq!(config.operation_timeout(), Duration::from_secs(60));
        assert_eq!(config.io_size(), 1024);
    }

    #[test]
    fn json_rejects_empty_host() {
        let err = ConnectionConfig::from_json_str(r#"{"host": " ", "username": "u", "password": "p"}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn json_rejects_garbage() {
        let err = ConnectionConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn debug_output_redacts_credential() {
        let config = ConnectionConfig::new("h", 22, "u", "hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn lookup_reads_prefixed_keys() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SFTP_CLIENT_HOST", "10.0.0.5"),
            ("SFTP_CLIENT_PORT", "2022"),
            ("SFTP_CLIENT_USERNAME", "deploy"),
            ("SFTP_CLIENT_PASSWORD", "pw"),
            ("SFTP_CLIENT_CONNECT_TIMEOUT_MS", "5000"),
        ]);
        let config = ConnectionConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.address(), "10.0.0.5:2022");
        assert_eq!(config.username(), "deploy");
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.operation_timeout(), DEFAULT_OPERATION_TIMEOUT);
    }

    #[test]
    fn lookup_reports_missing_and_invalid_values() {
        let err = ConnectionConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(key) if key == "SFTP_CLIENT_HOST"));

        let err = ConnectionConfig::from_lookup(|key| match key {
            "SFTP_CLIENT_PORT" => Some("ssh".to_string()),
            _ => Some("x".to_string()),
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
