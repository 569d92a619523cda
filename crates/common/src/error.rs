//! Configuration and file errors shared across crates

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required credential was found neither in the environment nor in config.
    #[error("{what} missing: set {env_var} or {config_key}")]
    MissingCredential {
        what: &'static str,
        env_var: &'static str,
        config_key: &'static str,
    },

    #[error("failed to read secret file {}: {source}", path.display())]
    SecretFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_the_problem() {
        let err = Error::Config("consumer key missing".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: consumer key missing"
        );
    }

    #[test]
    fn missing_credential_names_both_sources() {
        let err = Error::MissingCredential {
            what: "consumer secret",
            env_var: "ETRADE_CONSUMER_SECRET",
            config_key: "etrade.consumer_secret_file",
        };
        assert_eq!(
            err.to_string(),
            "consumer secret missing: set ETRADE_CONSUMER_SECRET or etrade.consumer_secret_file"
        );
    }

    #[test]
    fn io_error_converts() {
        fn read() -> Result<String> {
            Ok(std::fs::read_to_string("/nonexistent/etrader.toml")?)
        }
        let err = read().unwrap_err();
        assert!(err.to_string().starts_with("I/O error:"), "got: {err}");
    }

    #[test]
    fn toml_error_converts() {
        let parsed: std::result::Result<toml::Value, _> = toml::from_str("not = [valid");
        let err: Error = parsed.unwrap_err().into();
        assert!(matches!(err, Error::Toml(_)));
    }
}
