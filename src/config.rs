//! Provider configuration, resolved once at startup and never mutated afterwards.

mod env;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::providers::ProviderKind;
use crate::{RelayError, Result};

pub use env::{Env, parse_dotenv};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const PRIMARY_ENV: &str = "IMAGE_RELAY_PRIMARY";
const FALLBACK_ENV: &str = "IMAGE_RELAY_FALLBACK";
const TIMEOUT_ENV: &str = "IMAGE_RELAY_TIMEOUT_SECS";

#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider_name: String,
    pub api_key: Option<String>,
    pub api_url: String,
    pub extra_params: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider_name", &self.provider_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("extra_params", &self.extra_params)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            provider_name: kind.as_str().to_string(),
            api_key: None,
            api_url: kind.default_api_url().to_string(),
            extra_params: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.trim().is_empty()).then_some(api_key);
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_extra_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn kind(&self) -> Result<ProviderKind> {
        ProviderKind::from_name(&self.provider_name)
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn from_env(kind: ProviderKind, env: &Env, timeout: Duration) -> Self {
        let mut config = Self::new(kind).with_timeout(timeout);
        config.api_key = env.get_first(kind.api_key_env_keys());
        if let Some(url) = env.get(kind.api_url_env_key()) {
            config.api_url = url;
        }
        config
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    pub primary: ProviderConfig,
    pub fallback: Option<ProviderConfig>,
}

impl RelayConfig {
    pub fn new(primary: ProviderConfig) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: ProviderConfig) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Builds the provider pair from `UNSPLASH_*`, `STARRYAI_*` and `IMAGE_RELAY_*` variables.
    pub fn from_env(env: &Env) -> Result<Self> {
        let timeout = parse_timeout(env.get(TIMEOUT_ENV).as_deref())?;

        let primary = env
            .get(PRIMARY_ENV)
            .map(|name| ProviderKind::from_name(&name))
            .transpose()?
            .unwrap_or(ProviderKind::Unsplash);

        let fallback = match env.get(FALLBACK_ENV) {
            Some(name) if is_disabled(&name) => None,
            Some(name) => Some(ProviderKind::from_name(&name)?),
            None => Some(ProviderKind::StarryAi).filter(|kind| *kind != primary),
        };

        let config = Self {
            primary: ProviderConfig::from_env(primary, env, timeout),
            fallback: fallback.map(|kind| ProviderConfig::from_env(kind, env, timeout)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str, env: &Env) -> Result<Self> {
        let file: RelayConfigFile = toml::from_str(contents)?;
        let config = Self {
            primary: file.primary.resolve(env)?,
            fallback: file.fallback.map(|section| section.resolve(env)).transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>, env: &Env) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents, env)
    }

    pub fn validate(&self) -> Result<()> {
        self.primary.kind()?;
        if let Some(fallback) = self.fallback.as_ref() {
            fallback.kind()?;
            if fallback.provider_name == self.primary.provider_name {
                return Err(RelayError::Configuration(format!(
                    "fallback provider must differ from primary ({})",
                    self.primary.provider_name
                )));
            }
        }
        for provider in std::iter::once(&self.primary).chain(self.fallback.as_ref()) {
            let parsed = url::Url::parse(&provider.api_url).map_err(|err| {
                RelayError::Configuration(format!(
                    "invalid api_url for {}: {err}",
                    provider.provider_name
                ))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(RelayError::Configuration(format!(
                    "api_url for {} must be http(s)",
                    provider.provider_name
                )));
            }
            if provider.timeout.is_zero() {
                return Err(RelayError::Configuration(format!(
                    "timeout for {} must be > 0",
                    provider.provider_name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RelayConfigFile {
    primary: ProviderSection,
    #[serde(default)]
    fallback: Option<ProviderSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProviderSection {
    provider: String,
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default)]
    api_key_env: Vec<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    extra_params: BTreeMap<String, String>,
}

impl ProviderSection {
    fn resolve(self, env: &Env) -> Result<ProviderConfig> {
        let kind = ProviderKind::from_name(&self.provider)?;
        let mut config = ProviderConfig::new(kind);
        config.api_key = if self.api_key_env.is_empty() {
            env.get_first(kind.api_key_env_keys())
        } else {
            env.get_first(self.api_key_env.as_slice())
        };
        if let Some(url) = self.api_url.filter(|url| !url.trim().is_empty()) {
            config.api_url = url;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        config.extra_params = self.extra_params;
        Ok(config)
    }
}

fn is_disabled(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "none" | "off" | "disabled" | "false"
    )
}

fn parse_timeout(raw: Option<&str>) -> Result<Duration> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_TIMEOUT);
    };
    let secs = raw.trim().parse::<u64>().map_err(|_| {
        RelayError::Configuration(format!("invalid {TIMEOUT_ENV}: {raw:?}"))
    })?;
    if secs == 0 {
        return Err(RelayError::Configuration(format!("{TIMEOUT_ENV} must be > 0")));
    }
    Ok(Duration::from_secs(secs))
}
