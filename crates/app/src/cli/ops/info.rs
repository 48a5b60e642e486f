use clap::Args;

use common::pipeline::PipelineError;
use common::registry::FileId;
use sealbox::state::StateError;

/// Show a file's public metadata and whether you can open it
#[derive(Args, Debug, Clone)]
pub struct Info {
    /// File id
    pub id: FileId,
}

#[derive(Debug, thiserror::Error)]
pub enum InfoError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("info failed: {0}")]
    Pipeline(#[from] PipelineError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Info {
    type Error = InfoError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (pipeline, identity) = ctx.session().await?;
        let metadata = pipeline.metadata(self.id).await?;
        let access = pipeline
            .registry()
            .authorize(self.id, &identity)
            .await
            .map_err(PipelineError::from)?;

        Ok(format!(
            "File {}\n\
             - Owner: {}\n\
             - Created: {}\n\
             - Grantees: {}\n\
             - Access for {}: {}",
            metadata.id,
            metadata.owner,
            metadata.created_at.to_rfc3339(),
            metadata.grantee_count,
            identity,
            if access { "yes" } else { "no" }
        ))
    }
}
