use clap::Args;

use common::pipeline::PipelineError;
use sealbox::state::StateError;

/// List the files you own
#[derive(Args, Debug, Clone)]
pub struct Ls;

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("ls failed: {0}")]
    Pipeline(#[from] PipelineError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = LsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (pipeline, identity) = ctx.session().await?;
        let ids = pipeline.list_owned(&identity).await?;

        if ids.is_empty() {
            return Ok(format!("No files owned by {}", identity));
        }

        let mut lines = Vec::with_capacity(ids.len());
        for id in ids {
            let metadata = pipeline.metadata(id).await?;
            lines.push(format!(
                "{}\t{}\t{} grantee(s)",
                metadata.id,
                metadata.created_at.to_rfc3339(),
                metadata.grantee_count
            ));
        }
        Ok(lines.join("\n"))
    }
}
