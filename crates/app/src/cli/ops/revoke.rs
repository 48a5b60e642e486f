use clap::Args;

use common::identity::Identity;
use common::pipeline::PipelineError;
use common::registry::FileId;
use sealbox::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Revoke {
    /// File id
    pub id: FileId,

    /// Identity whose access to withdraw
    pub grantee: Identity,
}

#[derive(Debug, thiserror::Error)]
pub enum RevokeError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("revoke failed: {0}")]
    Pipeline(#[from] PipelineError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Revoke {
    type Error = RevokeError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (pipeline, identity) = ctx.session().await?;

        if pipeline.revoke(self.id, &identity, &self.grantee).await? {
            Ok(format!("Revoked {}'s access to file {}", self.grantee, self.id))
        } else {
            Ok(format!("{} had no access to file {}", self.grantee, self.id))
        }
    }
}
