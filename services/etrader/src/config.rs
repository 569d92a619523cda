//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The consumer secret is loaded from ETRADE_CONSUMER_SECRET or
//! consumer_secret_file, never stored in the TOML directly.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use etrade_api::ClientSettings;
use etrade_auth::{
    CommandVerifier, Consumer, CredentialCache, Endpoints, Environment, PromptVerifier,
    VerifierAcquirer,
};
use etrade_session::{AuthSettings, RenewalPolicy};
use serde::Deserialize;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub etrade: EtradeConfig,
    #[serde(default)]
    pub renewal: RenewalPolicy,
    #[serde(default)]
    pub verifier: VerifierConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Provider connection and session cache settings
#[derive(Debug, Deserialize)]
pub struct EtradeConfig {
    #[serde(default)]
    pub environment: Environment,
    /// Overrides the environment's API host (tests, proxies).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Overridden by ETRADE_CONSUMER_KEY.
    #[serde(default)]
    pub consumer_key: Option<String>,
    #[serde(skip)]
    pub consumer_secret: Option<Secret<String>>,
    /// Path to a file containing the consumer secret (alternative to ETRADE_CONSUMER_SECRET)
    #[serde(default)]
    pub consumer_secret_file: Option<PathBuf>,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default = "default_use_cached_session")]
    pub use_cached_session: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for EtradeConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            base_url: None,
            consumer_key: None,
            consumer_secret: None,
            consumer_secret_file: None,
            cache_path: default_cache_path(),
            use_cached_session: default_use_cached_session(),
            timeout_secs: default_timeout(),
        }
    }
}

/// How the verifier code is obtained during a fresh authorization
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum VerifierConfig {
    /// Print the authorize URL and read the code from stdin.
    #[default]
    Prompt,
    /// Run `program args.. <authorize-url>` and read the code from its stdout.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Prometheus exporter settings
#[derive(Debug, Default, Deserialize)]
pub struct MetricsConfig {
    /// Serve `/metrics` on this address when set.
    #[serde(default)]
    pub listen_addr: Option<SocketAddr>,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("cache.bin")
}

fn default_use_cached_session() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Consumer key resolution: ETRADE_CONSUMER_KEY, then `consumer_key`.
    /// Consumer secret resolution: ETRADE_CONSUMER_SECRET, then
    /// `consumer_secret_file`.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Some(ref url) = config.etrade.base_url
            && !url.starts_with("http://")
            && !url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {url}"
            )));
        }

        if config.etrade.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.renewal.interval.is_zero() {
            return Err(common::Error::Config(
                "renewal interval_secs must be greater than 0".into(),
            ));
        }

        if let VerifierConfig::Command { ref program, .. } = config.verifier
            && program.trim().is_empty()
        {
            return Err(common::Error::Config(
                "verifier program must not be empty".into(),
            ));
        }

        if let Ok(key) = std::env::var("ETRADE_CONSUMER_KEY") {
            config.etrade.consumer_key = Some(key);
        }
        if config
            .etrade
            .consumer_key
            .as_deref()
            .is_none_or(|k| k.trim().is_empty())
        {
            return Err(common::Error::MissingCredential {
                what: "consumer key",
                env_var: "ETRADE_CONSUMER_KEY",
                config_key: "etrade.consumer_key",
            });
        }

        // Secret: env var takes precedence over file
        if let Ok(secret) = std::env::var("ETRADE_CONSUMER_SECRET") {
            config.etrade.consumer_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.etrade.consumer_secret_file {
            config.etrade.consumer_secret = Secret::from_file(secret_file)?;
        }
        if config.etrade.consumer_secret.is_none() {
            return Err(common::Error::MissingCredential {
                what: "consumer secret",
                env_var: "ETRADE_CONSUMER_SECRET",
                config_key: "etrade.consumer_secret_file",
            });
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("etrader.toml")
    }

    pub fn endpoints(&self) -> Endpoints {
        match self.etrade.base_url {
            Some(ref url) => Endpoints::new(url.clone()),
            None => Endpoints::for_environment(self.etrade.environment),
        }
    }

    /// Client settings. Only valid on a config returned by `load`, which
    /// guarantees the consumer key and secret are present.
    pub fn client_settings(&self) -> common::Result<ClientSettings> {
        let (Some(key), Some(secret)) = (
            self.etrade.consumer_key.clone(),
            self.etrade.consumer_secret.clone(),
        ) else {
            return Err(common::Error::Config(
                "consumer key and secret are required".into(),
            ));
        };

        Ok(ClientSettings {
            auth: AuthSettings {
                endpoints: self.endpoints(),
                consumer: Consumer::new(key, secret),
                cache: CredentialCache::new(self.etrade.cache_path.clone()),
                use_cached_session: self.etrade.use_cached_session,
                max_session_age: self.renewal.max_age,
            },
            renewal: self.renewal.clone(),
            http_timeout: Duration::from_secs(self.etrade.timeout_secs),
        })
    }

    pub fn verifier(&self) -> Arc<dyn VerifierAcquirer> {
        match self.verifier {
            VerifierConfig::Prompt => Arc::new(PromptVerifier),
            VerifierConfig::Command {
                ref program,
                ref args,
            } => Arc::new(CommandVerifier::new(program.clone(), args.clone())),
        }
    }
}
