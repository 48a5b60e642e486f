use std::path::PathBuf;

use clap::Args;

use common::pipeline::PipelineError;
use common::registry::FileId;
use sealbox::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Download {
    /// File id to download
    pub id: FileId,

    /// Where to write the plaintext (defaults to ./file-<id>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("download failed: {0}")]
    Pipeline(#[from] PipelineError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Download {
    type Error = DownloadError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (pipeline, identity) = ctx.session().await?;
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("file-{}", self.id)));

        let written = pipeline.download_to(self.id, &identity, &output).await?;

        Ok(format!(
            "Wrote {} bytes of file {} to {}",
            written,
            self.id,
            output.display()
        ))
    }
}
