//! UI-coordination state. This is not the data store (the SQLite store in
//! `aperture-db` is); it holds identity, domain version counters, the
//! widget-lifecycle epoch, and a lightweight job registry (§4.8).

use std::collections::HashMap;

/// Lightweight summary of a tracked job, mirrored from `ml_job` rows by the
/// job system's own dispatches — never read directly from here.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub job_id: String,
    pub kind: String,
    pub title: String,
    pub status: String,
    pub progress: f64,
    pub message: String,
    pub started_at: Option<f64>,
    pub finished_at: Option<f64>,
}

impl JobSnapshot {
    pub fn new(job_id: impl Into<String>, kind: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            kind: kind.into(),
            title: title.into(),
            status: "queued".to_string(),
            progress: 0.0,
            message: String::new(),
            started_at: None,
            finished_at: None,
        }
    }
}

/// Authoritative UI-coordination state (§4.8).
///
/// Domain version counters (`media_v`, `tags_v`, ...) are monotonic and are
/// bumped only after the corresponding DB commit lands. `ui_epoch` gates
/// widget lifecycle only (shutdown, restart) and must never be used to
/// reject or gate a data action — the two are deliberately independent.
#[derive(Debug, Clone, Default)]
pub struct ProjectState {
    pub project_id: Option<i64>,
    pub selected_folder_id: Option<i64>,
    pub selected_branch_key: String,

    pub media_v: u64,
    pub tags_v: u64,
    pub people_v: u64,
    pub faces_v: u64,
    pub duplicates_v: u64,
    pub embeddings_v: u64,
    pub stacks_v: u64,
    pub videos_v: u64,
    pub groups_v: u64,
    pub settings_v: u64,
    pub jobs_v: u64,

    pub ui_epoch: u64,
    pub closing: bool,

    pub jobs: HashMap<String, JobSnapshot>,
    pub last_error: Option<String>,
}

impl ProjectState {
    pub fn new() -> Self {
        Self {
            selected_branch_key: "all".to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn snapshot_versions(&self) -> VersionSnapshot {
        VersionSnapshot {
            media_v: self.media_v,
            tags_v: self.tags_v,
            people_v: self.people_v,
            faces_v: self.faces_v,
            duplicates_v: self.duplicates_v,
            embeddings_v: self.embeddings_v,
            stacks_v: self.stacks_v,
            videos_v: self.videos_v,
            groups_v: self.groups_v,
            settings_v: self.settings_v,
            jobs_v: self.jobs_v,
            ui_epoch: self.ui_epoch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VersionSnapshot {
    pub media_v: u64,
    pub tags_v: u64,
    pub people_v: u64,
    pub faces_v: u64,
    pub duplicates_v: u64,
    pub embeddings_v: u64,
    pub stacks_v: u64,
    pub videos_v: u64,
    pub groups_v: u64,
    pub settings_v: u64,
    pub jobs_v: u64,
    pub ui_epoch: u64,
}

impl VersionSnapshot {
    /// Field-name/delta pairs for every counter that moved, in declaration order.
    pub(crate) fn deltas(&self, new: &VersionSnapshot) -> Vec<(&'static str, u64, u64)> {
        let pairs: [(&'static str, u64, u64); 12] = [
            ("media_v", self.media_v, new.media_v),
            ("tags_v", self.tags_v, new.tags_v),
            ("people_v", self.people_v, new.people_v),
            ("faces_v", self.faces_v, new.faces_v),
            ("duplicates_v", self.duplicates_v, new.duplicates_v),
            ("embeddings_v", self.embeddings_v, new.embeddings_v),
            ("stacks_v", self.stacks_v, new.stacks_v),
            ("videos_v", self.videos_v, new.videos_v),
            ("groups_v", self.groups_v, new.groups_v),
            ("settings_v", self.settings_v, new.settings_v),
            ("jobs_v", self.jobs_v, new.jobs_v),
            ("ui_epoch", self.ui_epoch, new.ui_epoch),
        ];
        pairs.into_iter().filter(|(_, old, new)| old != new).collect()
    }
}
