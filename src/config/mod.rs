use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    5000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign session tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    /// Lifetime of issued tokens in hours (default: 24)
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// Bootstrap admin account created at startup when missing
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            issuer: default_issuer(),
            audience: default_audience(),
            token_ttl_hours: default_token_ttl_hours(),
            admin_email: None,
            admin_password: None,
        }
    }
}

fn default_jwt_secret() -> String {
    // Tokens signed with a generated secret do not survive a restart
    warn!("No auth.jwt_secret configured, generating an ephemeral signing secret");
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

fn default_issuer() -> String {
    "travel-booking-api".to_string()
}

fn default_audience() -> String {
    "travel-booking-client".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    /// SQLite file name inside `server.data_dir`
    #[serde(default = "default_db_file")]
    pub file: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            file: default_db_file(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_backend() -> StoreBackend {
    StoreBackend::Sqlite
}

fn default_db_file() -> String {
    "travel.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

/// Which data-source implementation backs the API
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    /// Load while `subscriber` collects the messages loading emits. Used
    /// before the global subscriber exists, whose level depends on the
    /// loaded config.
    pub fn load_with<S>(path: &Path, subscriber: S) -> Result<Self>
    where
        S: tracing::Subscriber + Send + Sync + 'static,
    {
        tracing::subscriber::with_default(subscriber, || Self::load(path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse configuration file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < 32 {
            anyhow::bail!("auth.jwt_secret must be at least 32 characters");
        }
        if self.auth.token_ttl_hours <= 0 {
            anyhow::bail!("auth.token_ttl_hours must be positive");
        }
        if self.auth.admin_email.is_some() != self.auth.admin_password.is_some() {
            anyhow::bail!("auth.admin_email and auth.admin_password must be set together");
        }
        Ok(())
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = Config::parse(&format!("[auth]\njwt_secret = \"{}\"\n", SECRET)).unwrap();
        assert_eq!(config.server.api_port, 5000);
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.auth.issuer, "travel-booking-api");
        assert_eq!(config.database.backend, StoreBackend::Sqlite);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_memory_backend() {
        let toml = format!(
            "[auth]\njwt_secret = \"{}\"\n[database]\nbackend = \"memory\"\n",
            SECRET
        );
        let config = Config::parse(&toml).unwrap();
        assert_eq!(config.database.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(Config::parse("[auth]\njwt_secret = \"short\"\n").is_err());
    }

    #[test]
    fn test_admin_credentials_must_be_paired() {
        let toml = format!(
            "[auth]\njwt_secret = \"{}\"\nadmin_email = \"root@example.com\"\n",
            SECRET
        );
        assert!(Config::parse(&toml).is_err());
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_load_with_reports_defaults_and_generated_secret() {
        let dir = tempfile::tempdir().unwrap();
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let config = Config::load_with(&dir.path().join("missing.toml"), subscriber).unwrap();
        assert_eq!(config.server.api_port, 5000);

        let output = String::from_utf8(captured.0.lock().clone()).unwrap();
        assert!(output.contains("No config file found"), "{}", output);
        assert!(output.contains("ephemeral signing secret"), "{}", output);
    }

    #[test]
    fn test_generated_secret_is_long_enough() {
        let config = Config::default();
        assert_eq!(config.auth.jwt_secret.len(), 64);
    }
}
