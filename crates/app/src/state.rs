use std::{fs, path::PathBuf, str::FromStr};

use common::crypto::{KeyringVault, Secret};
use common::identity::Identity;
use common::pipeline::Pipeline;
use common::store::BlobsStore;
use serde::{Deserialize, Serialize};

use crate::database::{Database, DatabaseSetupError};

pub const APP_NAME: &str = "sealbox";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "db.sqlite";
pub const VAULT_KEY_FILE_NAME: &str = "vault.pem";
pub const BLOBS_DIR_NAME: &str = "blobs";

/// The pipeline the CLI drives
pub type SealboxPipeline = Pipeline<BlobsStore, Database, KeyringVault>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Identity used when `--as` is not given
    #[serde(default)]
    pub identity: Option<Identity>,
    /// Default tracing level; RUST_LOG overrides it
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub blob_store: BlobStoreConfig,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            identity: None,
            log_level: default_log_level(),
            blob_store: BlobStoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// The configured level, falling back to WARN if it does not parse
    pub fn log_level(&self) -> tracing::Level {
        tracing::Level::from_str(&self.log_level).unwrap_or(tracing::Level::WARN)
    }
}

/// Where ciphertext blobs live
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlobStoreConfig {
    /// iroh-blobs FsStore under the state directory
    #[default]
    Fs,
    /// iroh-blobs MemStore; nothing survives the process
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the sealbox directory (~/.sealbox)
    pub sealbox_dir: PathBuf,
    /// Path to the SQLite registry ledger
    pub db_path: PathBuf,
    /// Path to the vault master key PEM file
    pub vault_key_path: PathBuf,
    /// Path to the blobs directory
    pub blobs_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the sealbox directory path (custom or default ~/.sealbox)
    pub fn sealbox_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new sealbox state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let sealbox_dir = Self::sealbox_dir(custom_path)?;

        if sealbox_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&sealbox_dir)?;

        let blobs_path = sealbox_dir.join(BLOBS_DIR_NAME);
        fs::create_dir_all(&blobs_path)?;

        let master = Secret::generate();
        let vault_key_path = sealbox_dir.join(VAULT_KEY_FILE_NAME);
        fs::write(&vault_key_path, master.to_pem())?;

        let config = config.unwrap_or_default();
        let config_path = sealbox_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        // sqlite treats an empty file as an empty database; tables are
        //  created by migrations on first connect
        let db_path = sealbox_dir.join(DB_FILE_NAME);
        fs::write(&db_path, "")?;

        Ok(Self {
            sealbox_dir,
            db_path,
            vault_key_path,
            blobs_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the sealbox directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let sealbox_dir = Self::sealbox_dir(custom_path)?;

        if !sealbox_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let db_path = sealbox_dir.join(DB_FILE_NAME);
        let vault_key_path = sealbox_dir.join(VAULT_KEY_FILE_NAME);
        let blobs_path = sealbox_dir.join(BLOBS_DIR_NAME);
        let config_path = sealbox_dir.join(CONFIG_FILE_NAME);

        if !db_path.exists() {
            return Err(StateError::MissingFile(DB_FILE_NAME.to_string()));
        }
        if !vault_key_path.exists() {
            return Err(StateError::MissingFile(VAULT_KEY_FILE_NAME.to_string()));
        }
        if !blobs_path.exists() {
            return Err(StateError::MissingFile(format!("{}/", BLOBS_DIR_NAME)));
        }
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            sealbox_dir,
            db_path,
            vault_key_path,
            blobs_path,
            config_path,
            config,
        })
    }

    /// Load the vault master key from its PEM file
    pub fn load_vault(&self) -> Result<KeyringVault, StateError> {
        let pem = fs::read_to_string(&self.vault_key_path)?;
        let master = Secret::from_pem(&pem).map_err(|e| StateError::InvalidKey(e.to_string()))?;
        Ok(KeyringVault::new(master))
    }

    /// Open the blob store, ledger and vault and wire them into a pipeline
    pub async fn pipeline(&self) -> Result<SealboxPipeline, StateError> {
        let store = match self.config.blob_store {
            BlobStoreConfig::Fs => BlobsStore::fs(&self.blobs_path).await,
            BlobStoreConfig::Memory => BlobsStore::memory().await,
        }
        .map_err(|e| StateError::BlobStore(e.to_string()))?;
        let database = Database::connect(&self.db_path).await?;
        let vault = self.load_vault()?;

        tracing::debug!(dir = %self.sealbox_dir.display(), "opened sealbox state");
        Ok(Pipeline::new(store, database, vault))
    }

    /// The explicit identity if given, else the configured default
    pub fn identity(&self, explicit: Option<&Identity>) -> Result<Identity, StateError> {
        explicit
            .or(self.config.identity.as_ref())
            .cloned()
            .ok_or(StateError::NoIdentity)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("sealbox directory not initialized. Run 'sealbox init' first")]
    NotInitialized,

    #[error("sealbox directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid vault key: {0}")]
    InvalidKey(String),

    #[error("no identity given. Pass --as or set `identity` in config.toml")]
    NoIdentity,

    #[error("blob store error: {0}")]
    BlobStore(String),

    #[error("database error: {0}")]
    Database(#[from] DatabaseSetupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
