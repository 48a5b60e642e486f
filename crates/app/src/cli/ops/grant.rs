use clap::Args;

use common::identity::Identity;
use common::pipeline::PipelineError;
use common::registry::FileId;
use sealbox::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Grant {
    /// File id to share
    pub id: FileId,

    /// Identity to share it with
    pub grantee: Identity,
}

#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("grant failed: {0}")]
    Pipeline(#[from] PipelineError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Grant {
    type Error = GrantError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (pipeline, identity) = ctx.session().await?;
        let record = pipeline.grant(self.id, &identity, &self.grantee).await?;

        Ok(format!(
            "Granted {} access to file {} at {}",
            record.grantee,
            record.file_id,
            record.granted_at.to_rfc3339()
        ))
    }
}
