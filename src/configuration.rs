use std::time::Duration;

use lettre::Address;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::{client_addr::TrustedProxies, domain::FieldLimits};

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub contact: ContactSettings,
    pub email_client: EmailClientSettings,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    /// Prefix the endpoint is mounted under, e.g. `/api` behind a reverse proxy.
    #[serde(default)]
    pub root_path: Option<String>,
    #[serde(default = "default_true")]
    pub proxy_headers: bool,
    #[serde(default)]
    pub forwarded_allow_ips: TrustedProxies,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ContactSettings {
    /// Path segment of the contact endpoint. A random one is picked at startup when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub expected_host: String,
    #[serde(default)]
    pub expected_referer: String,
    #[serde(default = "default_true")]
    pub check_referer: bool,
    #[serde(default = "default_true")]
    pub enforce_field_lengths: bool,
    #[serde(
        default = "default_name_max_length",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub name_max_length: usize,
    #[serde(
        default = "default_phone_max_length",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub phone_max_length: usize,
    pub recipient: Address,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmailClientSettings {
    pub server: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub sender_email: Address,
    /// Upgrade the connection with STARTTLS.
    #[serde(default)]
    pub tls: bool,
    /// Connect over implicit TLS. Takes precedence over `tls`.
    #[serde(default)]
    pub ssl: bool,
    #[serde(
        default = "default_timeout_milliseconds",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub timeout_milliseconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_name_max_length() -> usize {
    128
}

fn default_phone_max_length() -> usize {
    64
}

fn default_timeout_milliseconds() -> u64 {
    5_000
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The root path as a route prefix: leading slash, no trailing slash, `None` when empty.
    pub fn route_prefix(&self) -> Option<String> {
        let trimmed = self.root_path.as_deref()?.trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(format!("/{}", trimmed))
        }
    }
}

impl ContactSettings {
    /// The configured endpoint segment, or a fresh random one.
    ///
    /// Called once while building the application so the route stays stable for the
    /// lifetime of the process.
    pub fn resolve_endpoint(&self) -> String {
        match self.endpoint.as_deref().map(|e| e.trim_matches('/')) {
            Some(endpoint) if !endpoint.is_empty() => endpoint.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn field_limits(&self) -> FieldLimits {
        if self.enforce_field_lengths {
            FieldLimits {
                name: Some(self.name_max_length),
                phone: Some(self.phone_max_length),
            }
        } else {
            FieldLimits::unbounded()
        }
    }
}

impl EmailClientSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;
    let configuration_directory = base_path.join("configuration");
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base")).required(true))
        .add_source(
            config::File::from(configuration_directory.join(environment.as_str()))
                .required(false),
        )
        .add_source(config::Environment::with_prefix("app").separator("__"))
        .build()?
        .try_deserialize()
}

enum Environment {
    Local,
    Production,
}

impl Environment {
    fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "production" => Ok(Environment::Production),
            other => Err(format!("{} is not a valid environment", other)),
        }
    }
}
