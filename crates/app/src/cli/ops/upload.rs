use std::path::PathBuf;

use clap::Args;

use common::pipeline::PipelineError;
use sealbox::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Upload {
    /// File to encrypt and upload
    pub path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("upload failed: {0}")]
    Pipeline(#[from] PipelineError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Upload {
    type Error = UploadError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (pipeline, identity) = ctx.session().await?;
        let file_id = pipeline.upload_file(&self.path, &identity).await?;

        Ok(format!(
            "Uploaded {} as file {} (owner: {})",
            self.path.display(),
            file_id,
            identity
        ))
    }
}
