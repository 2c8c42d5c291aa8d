use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub media_dir: String,
    pub store_timeout: Duration,
    pub reference_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_lifetime: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| "127.0.0.1".to_string())
            .parse::<IpAddr>()
            .context("Failed to parse SERVER_HOST")?;
        let port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .context("Failed to parse SERVER_PORT")?;

        let uri = env::var("MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let name = env::var("MONGODB_DATABASE").unwrap_or_else(|_| "stopcard".to_string());

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let token_lifetime = env::var("TOKEN_LIFETIME_SECS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse::<i64>()
            .context("Failed to parse TOKEN_LIFETIME_SECS")?;

        let media_dir = env::var("MEDIA_DIR").unwrap_or_else(|_| "./files".to_string());

        let store_timeout = env::var("STORE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .context("Failed to parse STORE_TIMEOUT_SECS")?;

        // Department and officer reference data changes rarely; 6 hours.
        let reference_ttl = env::var("REFERENCE_TTL_SECS")
            .unwrap_or_else(|_| "21600".to_string())
            .parse::<u64>()
            .context("Failed to parse REFERENCE_TTL_SECS")?;

        Ok(Config {
            server: ServerConfig { host, port },
            database: DatabaseConfig { uri, name },
            auth: AuthConfig {
                jwt_secret,
                token_lifetime,
            },
            media_dir,
            store_timeout: Duration::from_secs(store_timeout),
            reference_ttl: Duration::from_secs(reference_ttl),
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}

static CONFIG: OnceCell<Config> = OnceCell::new();

pub fn init() -> Result<&'static Config> {
    CONFIG.get_or_try_init(Config::from_env)
}

pub fn get() -> &'static Config {
    CONFIG.get().expect("Config is not initialized")
}
