use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigBuilder as Builder, Environment, File};
use config::builder::DefaultState;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::certificate::filter::ALGORITHM_GOST_2012_256;
use crate::engine::types::{ChainPolicy, StoreSpec};
use crate::error::Error;
use crate::provider::ProviderOptions;
use crate::signing::archive::ZipArchiver;
use crate::signing::pipeline::ArtifactNaming;
use crate::types::{Locale, Result};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Engine availability configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Certificate store to open
    #[serde(default)]
    pub store: StoreSpec,

    /// Signature output configuration
    #[serde(default)]
    pub signing: SigningConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Engine availability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// How long to wait for the engine to finish loading (milliseconds)
    pub load_timeout_ms: u64,

    /// Language of user-facing error messages
    pub locale: Locale,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: 1000,
            locale: Locale::En,
        }
    }
}

/// Signature output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Public key algorithm OID kept by restricted listings
    pub algorithm_oid: String,

    /// Extension appended to signature files
    pub signature_extension: String,

    /// Extension given to archives
    pub archive_extension: String,

    /// Embed the whole certificate chain in signatures
    pub include_whole_chain: bool,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm_oid: ALGORITHM_GOST_2012_256.to_string(),
            signature_extension: "sig".to_string(),
            archive_extension: "zip".to_string(),
            include_whole_chain: true,
        }
    }
}

impl Settings {
    /// Load configuration from files, `.env` and environment variables.
    ///
    /// `CADES_CONFIG` names an explicit file; otherwise `config/default` and
    /// `config/{APP_ENV}` are read when present.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }

        let mut builder = Self::defaults()?;

        if let Ok(config_path) = env::var("CADES_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path));
        } else {
            builder = builder.add_source(File::with_name("config/default").required(false));

            let env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
            builder = builder.add_source(File::with_name(&format!("config/{}", env)).required(false));
        }

        Self::finish(builder)
    }

    /// Load configuration from one file plus environment variables
    pub fn load_from(path: &Path) -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::from(path));
        Self::finish(builder)
    }

    fn defaults() -> Result<Builder<DefaultState>> {
        Ok(ConfigBuilder::builder().add_source(ConfigBuilder::try_from(&Self::default())?))
    }

    fn finish(builder: Builder<DefaultState>) -> Result<Self> {
        let config = builder
            .add_source(
                Environment::with_prefix("CADES")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;

        debug!("Configuration loaded: {:?}", settings);
        Ok(settings)
    }

    /// Check if configuration is valid
    pub fn validate(&self) -> Result<()> {
        if self.provider.load_timeout_ms == 0 {
            return Err(Error::Config("Load timeout cannot be zero".into()));
        }

        if self.signing.signature_extension.is_empty() || self.signing.archive_extension.is_empty() {
            return Err(Error::Config("Output extensions cannot be empty".into()));
        }

        if self.signing.algorithm_oid.is_empty() {
            return Err(Error::Config("Algorithm OID cannot be empty".into()));
        }

        Ok(())
    }

    /// Engine load timeout
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.provider.load_timeout_ms)
    }

    /// Provider options described by this configuration
    pub fn provider_options(&self) -> ProviderOptions {
        ProviderOptions {
            store: self.store.clone(),
            algorithm_oid: self.signing.algorithm_oid.clone(),
            chain_policy: if self.signing.include_whole_chain {
                ChainPolicy::WholeChain
            } else {
                ChainPolicy::EndEntityOnly
            },
            naming: ArtifactNaming {
                signature_extension: self.signing.signature_extension.clone(),
                archive_extension: self.signing.archive_extension.clone(),
            },
            archiver: Arc::new(ZipArchiver::new()),
        }
    }
}
