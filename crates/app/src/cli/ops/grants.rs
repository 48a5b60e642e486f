use clap::Args;

use common::pipeline::PipelineError;
use common::registry::FileId;
use sealbox::state::StateError;

/// Show who a file is shared with (owner only)
#[derive(Args, Debug, Clone)]
pub struct Grants {
    /// File id
    pub id: FileId,
}

#[derive(Debug, thiserror::Error)]
pub enum GrantsError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("grants failed: {0}")]
    Pipeline(#[from] PipelineError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Grants {
    type Error = GrantsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (pipeline, identity) = ctx.session().await?;
        let grants = pipeline.grants(self.id, &identity).await?;

        if grants.is_empty() {
            return Ok(format!("File {} is not shared with anyone", self.id));
        }

        let output = grants
            .iter()
            .map(|g| format!("{}\t{}", g.grantee, g.granted_at.to_rfc3339()))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(output)
    }
}
