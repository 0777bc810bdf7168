//! The interface every pipeline stage implements to become schedulable
//! by the job manager (§4.2-4.6).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::JobSystemError;
use crate::handle::JobHandle;
use crate::kind::JobKind;

/// What a runner returns when its `run` call unwinds. Checking
/// [`JobHandle::poll_control`] at a safe point and returning `Paused`
/// or `Canceled` instead of an error is the cooperative-stop contract
/// (§4.7) — anything already committed to storage before that point
/// stays committed.
#[derive(Debug)]
pub enum JobOutcome {
    Completed(serde_json::Value),
    Paused,
    Canceled,
}

#[async_trait]
pub trait JobRunner: Send + Sync {
    fn kind(&self) -> JobKind;

    async fn run(&self, handle: Arc<JobHandle>) -> Result<JobOutcome, JobSystemError>;
}
