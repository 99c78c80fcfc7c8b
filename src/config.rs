use std::{collections::HashMap, fs, io, path::PathBuf};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;

use crate::soap::{prefix, wsse};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub signing: SigningConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SigningConfig {
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default)]
    pub certificate_path: Option<PathBuf>,
    pub passphrase: SecretString,
    pub envelope_prefix: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("signing.{0} is not configured")]
    NotConfigured(&'static str),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Wsse(#[from] wsse::Error),
}

impl SigningConfig {
    /// Reads the configured key and certificate files into a security context.
    ///
    /// # Errors
    /// Returns an error if a path is missing or a file cannot be read.
    /// The key itself is only parsed when the first envelope is signed.
    pub fn security_context(&self) -> Result<wsse::WsSecurityCert, ContextError> {
        let private_key = read(self.private_key_path.as_ref(), "private_key_path")?;
        let certificate = read(self.certificate_path.as_ref(), "certificate_path")?;

        Ok(wsse::WsSecurityCert::new(
            private_key,
            certificate,
            self.passphrase.clone(),
        )?)
    }
}

fn read(path: Option<&PathBuf>, key: &'static str) -> Result<Vec<u8>, ContextError> {
    let path = path.ok_or(ContextError::NotConfigured(key))?;
    fs::read(path).map_err(|source| ContextError::Read {
        path: path.clone(),
        source,
    })
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("signing.envelope_prefix", prefix::SOAP)?
            .set_default("signing.passphrase", "")?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Should be in the format APP_SIGNING__PRIVATE_KEY_PATH
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}
