//! Jobs this binary can dispatch and perform.

use std::time::Duration;

use backrun_core::{Job, JobError, async_trait};

/// Notify an app's subscribers about a new notice.
pub struct DeliverNotice;

#[async_trait]
impl Job for DeliverNotice {
    const NAME: &'static str = "deliver_notice";
    type Args = (String, u64);

    async fn perform(&self, (app, notice_id): Self::Args) -> Result<(), JobError> {
        if app.is_empty() {
            return Err(JobError::new("app name is empty"));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        tracing::info!(%app, notice_id, "notice delivered");
        Ok(())
    }
}

/// Recompute the daily digest for one problem.
pub struct RebuildDigest;

#[async_trait]
impl Job for RebuildDigest {
    const NAME: &'static str = "rebuild_digest";
    type Args = (String,);

    async fn perform(&self, (problem_id,): Self::Args) -> Result<(), JobError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tracing::info!(%problem_id, "digest rebuilt");
        Ok(())
    }
}
