use crate::error::ConfigError;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyConfig {
    /// Lifetime of newly issued tokens
    pub default_expiration: Duration,

    /// Deadline applied to each verification's DNS lookup
    pub lookup_timeout: Duration,

    /// Nameservers to query (empty = use the system configuration)
    pub nameservers: Vec<SocketAddr>,

    /// Attempts the resolver makes per nameserver before giving up
    pub attempts: usize,

    /// Whether the hosts file may answer lookups
    pub use_hosts_file: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            default_expiration: crate::token::DEFAULT_EXPIRATION,
            lookup_timeout: Duration::from_secs(10),
            nameservers: vec![],
            attempts: 2,
            use_hosts_file: false,
        }
    }
}

/// File representation; every field is optional and overrides the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    default_expiration_hours: Option<u64>,
    lookup_timeout_secs: Option<u64>,
    nameservers: Option<Vec<String>>,
    attempts: Option<usize>,
    use_hosts_file: Option<bool>,
}

impl VerifyConfig {
    /// Create a VerifyConfig from environment variables
    /// Returns Err if a present variable is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load a TOML file, then let environment variables override it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let mut config = Self::default();
        if let Some(hours) = file.default_expiration_hours {
            config.default_expiration = expiration_from_hours(hours)?;
        }
        if let Some(secs) = file.lookup_timeout_secs {
            config.lookup_timeout = Duration::from_secs(secs);
        }
        if let Some(servers) = file.nameservers {
            config.nameservers = parse_nameservers(servers.iter().map(String::as_str))?;
        }
        if let Some(attempts) = file.attempts {
            config.attempts = attempts;
        }
        if let Some(use_hosts_file) = file.use_hosts_file {
            config.use_hosts_file = use_hosts_file;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(hours) = std::env::var("TXTPROOF_DEFAULT_EXPIRATION_HOURS") {
            let hours = hours
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidExpiration(hours.clone()))?;
            self.default_expiration = expiration_from_hours(hours)?;
        }

        if let Ok(timeout_str) = std::env::var("TXTPROOF_LOOKUP_TIMEOUT") {
            let timeout_secs = timeout_str
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(timeout_str.clone()))?;
            self.lookup_timeout = Duration::from_secs(timeout_secs);
        }

        if let Ok(servers) = std::env::var("TXTPROOF_NAMESERVERS") {
            self.nameservers = parse_nameservers(servers.split(','))?;
        }

        if let Ok(attempts) = std::env::var("TXTPROOF_ATTEMPTS") {
            self.attempts = attempts
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidAttempts(attempts.clone()))?;
        }

        if let Ok(use_hosts_file) = std::env::var("TXTPROOF_USE_HOSTS_FILE") {
            self.use_hosts_file = parse_bool(&use_hosts_file, self.use_hosts_file);
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_expiration.is_zero() {
            return Err(ConfigError::InvalidExpiration(
                "Expiration must be greater than 0".to_string(),
            ));
        }
        if self.lookup_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        if self.attempts == 0 {
            return Err(ConfigError::InvalidAttempts(
                "Attempts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn expiration_from_hours(hours: u64) -> Result<Duration, ConfigError> {
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidExpiration(format!("{} hours is too large", hours)))
}

fn parse_nameservers<'a>(
    servers: impl Iterator<Item = &'a str>,
) -> Result<Vec<SocketAddr>, ConfigError> {
    let servers = servers
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<SocketAddr>()
                .map_err(|_| ConfigError::InvalidNameserver(s.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if servers.is_empty() {
        return Err(ConfigError::InvalidNameserver(
            "No valid nameservers provided".to_string(),
        ));
    }
    Ok(servers)
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}
