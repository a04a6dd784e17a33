//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::SessionConfig;
use crate::util::time::secs_to_ticks;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Supabase project URL
    pub supabase_url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub supabase_service_role_key: String,
    /// Supabase JWT secret for identity token verification
    pub supabase_jwt_secret: String,

    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,

    /// Hard ceiling on match length
    pub match_duration_secs: u32,
    /// Time both players have to get ready after pairing
    pub setup_timeout_secs: u32,
    /// Time a disconnected player has to come back before forfeiting
    pub reconnect_grace_secs: u32,
    /// Send state diffs as binary frames
    pub compress_diffs: bool,
    pub map_width: i32,
    pub map_height: i32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            supabase_url: required("SUPABASE_URL")?,
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET")?,
            client_origin: required("CLIENT_ORIGIN")?,

            match_duration_secs: parse_or("MATCH_DURATION_SECS", 180)?,
            setup_timeout_secs: parse_or("SETUP_TIMEOUT_SECS", 30)?,
            reconnect_grace_secs: parse_or("RECONNECT_GRACE_SECS", 10)?,
            compress_diffs: parse_or("COMPRESS_DIFFS", true)?,
            map_width: parse_or("MAP_WIDTH", 13)?,
            map_height: parse_or("MAP_HEIGHT", 11)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // Pillars sit on even/even cells, so the far spawn needs odd sizes
        if self.map_width < 5 || self.map_width % 2 == 0 {
            return Err(ConfigError::Invalid("MAP_WIDTH"));
        }
        if self.map_height < 5 || self.map_height % 2 == 0 {
            return Err(ConfigError::Invalid("MAP_HEIGHT"));
        }
        if self.match_duration_secs == 0 {
            return Err(ConfigError::Invalid("MATCH_DURATION_SECS"));
        }
        Ok(())
    }

    /// Per-session settings, with durations converted to ticks
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            width: self.map_width,
            height: self.map_height,
            setup_timeout_ticks: secs_to_ticks(self.setup_timeout_secs as f32) as u64,
            reconnect_grace_ticks: secs_to_ticks(self.reconnect_grace_secs as f32) as u64,
            max_duration_ticks: secs_to_ticks(self.match_duration_secs as f32) as u64,
            ..SessionConfig::default()
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
impl Config {
    /// Valid settings for unit tests
    pub(crate) fn for_tests() -> Self {
        Config {
            server_addr: "127.0.0.1:8080".parse().unwrap(),
            log_level: "info".into(),
            supabase_url: "http://localhost".into(),
            supabase_service_role_key: "key".into(),
            supabase_jwt_secret: "secret".into(),
            client_origin: "http://localhost:3000".into(),
            match_duration_secs: 120,
            setup_timeout_secs: 20,
            reconnect_grace_secs: 5,
            compress_diffs: true,
            map_width: 15,
            map_height: 13,
        }
    }
}
