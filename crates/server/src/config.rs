use crate::context::MatchPolicy;
use crate::entity::application::NewApplication;
use crate::entity::role::NewRole;
use serde::Deserialize;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Authorization code issuance and verification settings.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthorizationConfig {
    /// TTL applied when the caller does not ask for one (seconds).
    #[serde(default = "default_code_ttl")]
    pub default_code_ttl: i64,
    /// Upper bound every requested TTL is clamped to (seconds).
    #[serde(default = "default_max_code_ttl")]
    pub max_code_ttl: i64,
    /// Deactivate older active codes of the same (user, application) pair on issue.
    #[serde(default)]
    pub supersede_previous_codes: bool,
    #[serde(default)]
    pub match_policy: MatchPolicy,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            default_code_ttl: default_code_ttl(),
            max_code_ttl: default_max_code_ttl(),
            supersede_previous_codes: false,
            match_policy: MatchPolicy::default(),
        }
    }
}

fn default_code_ttl() -> i64 {
    6 * 3600
}

fn default_max_code_ttl() -> i64 {
    12 * 3600
}

/// Token lifetimes, in seconds.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: i64,
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: default_access_token_lifetime(),
            refresh_token_lifetime: default_refresh_token_lifetime(),
        }
    }
}

fn default_access_token_lifetime() -> i64 {
    15 * 60
}

fn default_refresh_token_lifetime() -> i64 {
    14 * 86400
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    /// Upper bound for a single storage call, in milliseconds.
    #[serde(default = "default_storage_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_storage_timeout_ms(),
        }
    }
}

fn default_storage_timeout_ms() -> u64 {
    5_000
}

impl StorageConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub authorization: AuthorizationConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Applications created at startup when missing.
    #[serde(default)]
    pub applications: Vec<NewApplication>,
    /// Roles created at startup when missing.
    #[serde(default)]
    pub roles: Vec<NewRole>,
    /// CIDR networks allowed to scrape `/metrics`. Examples: "127.0.0.1/32", "10.0.0.0/8".
    /// If not provided, defaults to common private & loopback ranges.
    #[serde(default = "default_metrics_allowed_nets")]
    pub metrics_allowed_nets: Vec<IpNet>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct IpNet {
    pub addr: IpAddr,
    pub prefix: u8,
}

impl IpNet {
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(a), IpAddr::V4(b)) => {
                let mask = if self.prefix == 0 {
                    0
                } else {
                    u32::MAX << (32 - self.prefix.min(32) as u32)
                };
                (u32::from(a) & mask) == (u32::from(*b) & mask)
            }
            (IpAddr::V6(a), IpAddr::V6(b)) => {
                let a_bytes = a.octets();
                let b_bytes = b.octets();
                let full_bytes = (self.prefix / 8) as usize;
                let rem_bits = self.prefix % 8;
                if full_bytes > 16 {
                    return false;
                }
                if a_bytes[..full_bytes] != b_bytes[..full_bytes] {
                    return false;
                }
                if rem_bits == 0 {
                    return true;
                }
                let mask = (!0u8) << (8 - rem_bits);
                (a_bytes[full_bytes] & mask) == (b_bytes[full_bytes] & mask)
            }
            _ => false,
        }
    }
}

impl FromStr for IpNet {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip_part, prefix_part) = s
            .split_once('/')
            .ok_or_else(|| "CIDR must contain '/'".to_string())?;
        let addr = IpAddr::from_str(ip_part).map_err(|e| format!("Invalid IP: {e}"))?;
        let prefix: u8 = prefix_part
            .parse()
            .map_err(|e| format!("Invalid prefix: {e}"))?;
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix as u32 > max {
            return Err("Prefix out of range".into());
        }
        Ok(IpNet { addr, prefix })
    }
}

impl TryFrom<String> for IpNet {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn default_metrics_allowed_nets() -> Vec<IpNet> {
    [
        "127.0.0.1/32",
        "10.0.0.0/8",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "::1/128",
        "fc00::/7",
    ]
    .iter()
    .filter_map(|s| s.parse().ok())
    .collect()
}

impl AppConfig {
    /// Minimal configuration with every optional section at its default.
    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            listen_addr: default_listen_addr(),
            authorization: AuthorizationConfig::default(),
            tokens: TokenConfig::default(),
            storage: StorageConfig::default(),
            applications: Vec::new(),
            roles: Vec::new(),
            metrics_allowed_nets: default_metrics_allowed_nets(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let auth = &self.authorization;
        if auth.default_code_ttl <= 0 {
            return Err(ConfigError::Validation(
                "authorization.default_code_ttl must be > 0".into(),
            ));
        }
        if auth.max_code_ttl < auth.default_code_ttl {
            return Err(ConfigError::Validation(
                "authorization.max_code_ttl must be >= default_code_ttl".into(),
            ));
        }
        if auth.match_policy.ipv4_subnet_prefix > 32 {
            return Err(ConfigError::Validation(
                "authorization.match_policy.ipv4_subnet_prefix must be <= 32".into(),
            ));
        }
        if auth.match_policy.ipv6_subnet_prefix > 128 {
            return Err(ConfigError::Validation(
                "authorization.match_policy.ipv6_subnet_prefix must be <= 128".into(),
            ));
        }
        if self.tokens.access_token_lifetime <= 0 {
            return Err(ConfigError::Validation(
                "tokens.access_token_lifetime must be > 0".into(),
            ));
        }
        if self.tokens.refresh_token_lifetime <= self.tokens.access_token_lifetime {
            return Err(ConfigError::Validation(
                "tokens.refresh_token_lifetime must exceed access_token_lifetime".into(),
            ));
        }
        if self.storage.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "storage.timeout_ms must be > 0".into(),
            ));
        }
        for app in &self.applications {
            if app.application_id.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "application '{}' has an empty application_id",
                    app.name
                )));
            }
        }
        for role in &self.roles {
            if role.name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "role '{}' has an empty name",
                    role.display_name
                )));
            }
        }
        Ok(())
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Environment variable override convention: any var matching the key path
/// separated by double underscores (e.g. `TOKENS__ACCESS_TOKEN_LIFETIME`) overrides
/// the file value.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from("config.yaml")
}

pub fn load_config_from(path: &str) -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Parse and validate a YAML document without touching the environment.
pub fn load_config_from_str(yaml: &str) -> Result<AppConfig, ConfigError> {
    use config::{Config, File, FileFormat};
    let app: AppConfig = Config::builder()
        .add_source(File::from_str(yaml, FileFormat::Yaml))
        .build()?
        .try_deserialize()?;
    app.validate()?;
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn ipv4_basic_matching() {
        let net: IpNet = "192.168.1.0/24".parse().unwrap();
        assert!(net.contains(&IpAddr::V4(Ipv4Addr::new(192, 168, 1, 42))));
        assert!(!net.contains(&IpAddr::V4(Ipv4Addr::new(192, 168, 2, 1))));
    }

    #[test]
    fn ipv4_prefix_zero() {
        let net: IpNet = "0.0.0.0/0".parse().unwrap();
        assert!(net.contains(&IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
    }

    #[test]
    fn ipv6_partial_byte_prefix() {
        let net: IpNet = "2001:db8::/33".parse().unwrap();
        assert!(net.contains(&IpAddr::V6("2001:db8:7fff::1".parse::<Ipv6Addr>().unwrap())));
        assert!(!net.contains(&IpAddr::V6("2001:db8:8000::1".parse::<Ipv6Addr>().unwrap())));
    }

    #[test]
    fn mixed_families_never_match() {
        let net: IpNet = "::/0".parse().unwrap();
        assert!(!net.contains(&IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[test]
    fn parse_rejects_bad_prefix() {
        assert!("192.168.0.0/33".parse::<IpNet>().is_err());
        assert!("2001:db8::/129".parse::<IpNet>().is_err());
        assert!("192.168.0.0".parse::<IpNet>().is_err());
    }

    #[test]
    fn defaults_validate() {
        let cfg = AppConfig::with_database_url("sqlite::memory:");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.authorization.default_code_ttl, 6 * 3600);
        assert!(!cfg.authorization.supersede_previous_codes);
    }

    #[test]
    fn rejects_minute_scale_refresh_lifetime() {
        let mut cfg = AppConfig::with_database_url("sqlite::memory:");
        cfg.tokens.refresh_token_lifetime = cfg.tokens.access_token_lifetime;
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_max_ttl_below_default() {
        let mut cfg = AppConfig::with_database_url("sqlite::memory:");
        cfg.authorization.max_code_ttl = 60;
        assert!(cfg.validate().is_err());
    }
}
