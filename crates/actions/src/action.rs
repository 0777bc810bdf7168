//! The closed set of actions dispatched through the [`crate::Store`]
//! (§4.8). Every variant carries [`ActionMeta`] provenance. New stages
//! of the pipeline dispatch a `*Completed` action after their DB commit
//! lands; the store's default handlers bump the relevant version
//! counters in response.

use super::state::JobSnapshot;

#[derive(Debug, Clone)]
pub struct ActionMeta {
    pub source: String,
    pub project_id: Option<i64>,
}

impl ActionMeta {
    pub fn new(source: impl Into<String>, project_id: Option<i64>) -> Self {
        Self { source: source.into(), project_id }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    ShutdownRequested { meta: ActionMeta, reason: String },
    AppRelaunchRequested { meta: ActionMeta, reason: String },
    ProjectSelected { meta: ActionMeta, project_id: i64 },
    FolderSelected { meta: ActionMeta, folder_id: Option<i64> },

    ScanStarted { meta: ActionMeta, job_id: String, folder_path: String, incremental: bool },
    ScanProgress { meta: ActionMeta, job_id: String, progress: f64, message: String },
    ScanCompleted { meta: ActionMeta, job_id: String, photos_indexed: u64, videos_indexed: u64 },

    EmbeddingsCompleted { meta: ActionMeta, job_id: String, generated: u64 },
    StacksCompleted { meta: ActionMeta, job_id: String, stacks_created: u64 },
    DuplicatesCompleted { meta: ActionMeta, job_id: String, exact_groups: u64, similar_stacks: u64 },
    FacesCompleted { meta: ActionMeta, job_id: String, detected: u64, clustered: u64 },

    GroupsChanged { meta: ActionMeta, group_id: Option<i64>, reason: String },
    GroupIndexCompleted { meta: ActionMeta, group_id: i64, match_count: u64, scope: String },

    TagsChanged { meta: ActionMeta, photo_ids: Vec<i64> },
    SettingsChanged { meta: ActionMeta, key: String },

    JobRegistered { meta: ActionMeta, job: JobSnapshot },
    JobProgress { meta: ActionMeta, job_id: String, progress: f64, message: String },
    JobFinished { meta: ActionMeta, job_id: String, status: String, message: String },

    ErrorRaised { meta: ActionMeta, message: String, where_: String },
}

impl Action {
    pub fn meta(&self) -> &ActionMeta {
        match self {
            Action::ShutdownRequested { meta, .. }
            | Action::AppRelaunchRequested { meta, .. }
            | Action::ProjectSelected { meta, .. }
            | Action::FolderSelected { meta, .. }
            | Action::ScanStarted { meta, .. }
            | Action::ScanProgress { meta, .. }
            | Action::ScanCompleted { meta, .. }
            | Action::EmbeddingsCompleted { meta, .. }
            | Action::StacksCompleted { meta, .. }
            | Action::DuplicatesCompleted { meta, .. }
            | Action::FacesCompleted { meta, .. }
            | Action::GroupsChanged { meta, .. }
            | Action::GroupIndexCompleted { meta, .. }
            | Action::TagsChanged { meta, .. }
            | Action::SettingsChanged { meta, .. }
            | Action::JobRegistered { meta, .. }
            | Action::JobProgress { meta, .. }
            | Action::JobFinished { meta, .. }
            | Action::ErrorRaised { meta, .. } => meta,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::ShutdownRequested { .. } => "ShutdownRequested",
            Action::AppRelaunchRequested { .. } => "AppRelaunchRequested",
            Action::ProjectSelected { .. } => "ProjectSelected",
            Action::FolderSelected { .. } => "FolderSelected",
            Action::ScanStarted { .. } => "ScanStarted",
            Action::ScanProgress { .. } => "ScanProgress",
            Action::ScanCompleted { .. } => "ScanCompleted",
            Action::EmbeddingsCompleted { .. } => "EmbeddingsCompleted",
            Action::StacksCompleted { .. } => "StacksCompleted",
            Action::DuplicatesCompleted { .. } => "DuplicatesCompleted",
            Action::FacesCompleted { .. } => "FacesCompleted",
            Action::GroupsChanged { .. } => "GroupsChanged",
            Action::GroupIndexCompleted { .. } => "GroupIndexCompleted",
            Action::TagsChanged { .. } => "TagsChanged",
            Action::SettingsChanged { .. } => "SettingsChanged",
            Action::JobRegistered { .. } => "JobRegistered",
            Action::JobProgress { .. } => "JobProgress",
            Action::JobFinished { .. } => "JobFinished",
            Action::ErrorRaised { .. } => "ErrorRaised",
        }
    }

    /// `job_id` carried by actions that target a specific job, for log lines.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Action::ScanStarted { job_id, .. }
            | Action::ScanProgress { job_id, .. }
            | Action::ScanCompleted { job_id, .. }
            | Action::EmbeddingsCompleted { job_id, .. }
            | Action::StacksCompleted { job_id, .. }
            | Action::DuplicatesCompleted { job_id, .. }
            | Action::FacesCompleted { job_id, .. }
            | Action::JobProgress { job_id, .. }
            | Action::JobFinished { job_id, .. } => Some(job_id.as_str()),
            Action::JobRegistered { job, .. } => Some(job.job_id.as_str()),
            _ => None,
        }
    }
}
