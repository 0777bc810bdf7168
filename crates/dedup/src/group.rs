//! `duplicate_group` job runner: computes exact-duplicate groups (free,
//! aggregate-only) and reclusters similar-photo stacks, then persists
//! the stacks. Exact-duplicate groups are not persisted — §4.3 treats
//! them as a cheap on-demand query, unlike stacks.

use std::sync::Arc;

use aperture_job_system::{JobHandle, JobKind, JobOutcome, JobRunner, JobSystemError};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::exact::exact_duplicate_groups;
use crate::similar::cluster_similar_assets;
use crate::stacks::persist_stacks;

pub struct DuplicateGroupRunner {
    db: DatabaseConnection,
}

impl DuplicateGroupRunner {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobRunner for DuplicateGroupRunner {
    fn kind(&self) -> JobKind {
        JobKind::DuplicateGroup
    }

    async fn run(&self, handle: Arc<JobHandle>) -> Result<JobOutcome, JobSystemError> {
        handle.checkpoint(0, 2, "grouping exact duplicates".to_string()).await?;
        let exact_groups = exact_duplicate_groups(&self.db, handle.project_id)
            .await
            .map_err(|e| JobSystemError::NoRunner(e.to_string()))?;

        handle.checkpoint(1, 2, "clustering similar photos".to_string()).await?;
        let clusters = cluster_similar_assets(&self.db, handle.project_id)
            .await
            .map_err(|e| JobSystemError::NoRunner(e.to_string()))?;
        let similar_stacks = clusters.len() as u64;
        let stacks_created = persist_stacks(&self.db, handle.project_id, clusters)
            .await
            .map_err(|e| JobSystemError::NoRunner(e.to_string()))?;

        handle.checkpoint(2, 2, "done".to_string()).await?;

        Ok(JobOutcome::Completed(serde_json::json!({
            "exact_groups": exact_groups.len() as u64,
            "similar_stacks": similar_stacks,
            "stacks_created": stacks_created,
        })))
    }
}
