use clap::Args;

use common::identity::Identity;
use sealbox::state::{AppConfig, AppState, BlobStoreConfig};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Default identity to act as
    #[arg(long)]
    pub identity: Option<Identity>,

    /// Default log level (RUST_LOG overrides)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Keep blobs in memory instead of on disk
    #[arg(long)]
    pub memory_blobs: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] sealbox::state::StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = AppConfig {
            identity: self.identity.clone().or_else(|| ctx.identity.clone()),
            log_level: self.log_level.clone(),
            blob_store: if self.memory_blobs {
                BlobStoreConfig::Memory
            } else {
                BlobStoreConfig::Fs
            },
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let identity = match &state.config.identity {
            Some(identity) => identity.to_string(),
            None => "none (pass --as)".to_string(),
        };

        let output = format!(
            "Initialized sealbox directory at: {}\n\
             - Database: {}\n\
             - Vault key: {}\n\
             - Blobs: {}\n\
             - Config: {}\n\
             - Identity: {}",
            state.sealbox_dir.display(),
            state.db_path.display(),
            state.vault_key_path.display(),
            state.blobs_path.display(),
            state.config_path.display(),
            identity
        );

        Ok(output)
    }
}
