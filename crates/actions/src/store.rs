//! Single, thread-safe dispatch point for all state transitions (§4.8).
//!
//! Thread-safety model:
//!   - state mutations happen under `state` lock.
//!   - subscribers are notified after the lock is released, so a
//!     subscriber that re-enters `dispatch` cannot deadlock.
//!   - subscribers are held by [`Weak`] so a dropped owner (e.g. a
//!     closed UI panel) is pruned on the next dispatch instead of
//!     leaking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::action::Action;
use crate::state::ProjectState;

pub type Subscriber = dyn Fn(&ProjectState, &Action) + Send + Sync;

/// Token returned by [`Store::subscribe`]; pass to [`Store::unsubscribe`]
/// for deterministic early removal (the weak ref is pruned automatically
/// once the caller's `Arc` is dropped, so this is an optimization, not a
/// correctness requirement).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    handler: Weak<Subscriber>,
}

pub struct Store {
    state: Mutex<ProjectState>,
    subscribers: Mutex<Vec<Subscription>>,
    next_id: AtomicU64,
    log_enabled: bool,
}

impl Store {
    pub fn new(initial_state: ProjectState) -> Self {
        Self {
            state: Mutex::new(initial_state),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            log_enabled: true,
        }
    }

    /// Snapshot of the current state. Cheap: `ProjectState` is a small
    /// value type cloned under the lock.
    pub fn state(&self) -> ProjectState {
        self.state.lock().clone()
    }

    pub fn subscribe(&self, handler: Weak<Subscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push(Subscription { id, handler });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().retain(|s| s.id != id);
    }

    pub fn make_meta(&self, source: impl Into<String>) -> crate::action::ActionMeta {
        crate::action::ActionMeta::new(source, self.state.lock().project_id)
    }

    /// Apply `action`, then notify subscribers. Safe to call from any
    /// thread or task — there is no GUI-thread affinity requirement in
    /// this engine; callers that need ordered delivery to a single
    /// consumer should serialize their own dispatches.
    pub fn dispatch(&self, action: Action) {
        let action_name = action.name();

        let (old_versions, new_versions, live) = {
            let mut state = self.state.lock();
            let old_versions = state.snapshot_versions();

            if let Err(panic_msg) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                reduce(&mut *state, &action);
            })) {
                tracing::error!(
                    action = action_name,
                    panic = ?panic_msg,
                    "reducer panicked, state may be partially applied"
                );
            }

            let new_versions = state.snapshot_versions();

            let mut subs = self.subscribers.lock();
            let mut live = Vec::with_capacity(subs.len());
            subs.retain(|s| {
                if let Some(handler) = s.handler.upgrade() {
                    live.push(handler);
                    true
                } else {
                    false
                }
            });

            (old_versions, new_versions, live)
        };

        if self.log_enabled {
            log_dispatch(&action, &old_versions, &new_versions, live.len());
        }

        let snapshot = self.state();
        for handler in live {
            handler(&snapshot, &action);
        }
    }
}

/// Built-in state transition for every [`Action`] variant (§4.8). Pure
/// mutation, no IO — equivalent to the teacher's registered default
/// handlers, collapsed into one reducer since the action set is closed.
fn reduce(state: &mut ProjectState, action: &Action) {
    use Action::*;

    match action {
        ShutdownRequested { .. } => {
            state.closing = true;
            state.ui_epoch += 1;
        }
        AppRelaunchRequested { .. } => {
            state.ui_epoch += 1;
            state.closing = false;
            state.jobs.clear();
            state.last_error = None;
        }
        ProjectSelected { project_id, .. } => {
            state.project_id = Some(*project_id);
            state.selected_folder_id = None;
            state.selected_branch_key = "all".to_string();
            // ui_epoch is NOT bumped: switching projects must not
            // invalidate in-flight workers, only their data versions.
            state.media_v += 1;
            state.people_v += 1;
            state.faces_v += 1;
            state.duplicates_v += 1;
            state.embeddings_v += 1;
            state.stacks_v += 1;
            state.videos_v += 1;
            state.groups_v += 1;
        }
        FolderSelected { folder_id, .. } => {
            state.selected_folder_id = *folder_id;
        }

        ScanStarted { job_id, .. } => {
            let mut job = crate::state::JobSnapshot::new(job_id.clone(), "scan", "Scanning images");
            job.status = "running".to_string();
            state.jobs.insert(job_id.clone(), job);
            state.jobs_v += 1;
        }
        ScanProgress { job_id, progress, message } => {
            if let Some(j) = state.jobs.get_mut(job_id) {
                j.progress = *progress;
                j.message = message.clone();
                j.status = "running".to_string();
            }
        }
        ScanCompleted { job_id, videos_indexed, .. } => {
            if let Some(j) = state.jobs.get_mut(job_id) {
                j.status = "done".to_string();
                j.progress = 1.0;
            }
            state.media_v += 1;
            if *videos_indexed > 0 {
                state.videos_v += 1;
            }
            state.jobs_v += 1;
        }

        EmbeddingsCompleted { job_id, .. } => {
            finish_job(state, job_id);
            state.embeddings_v += 1;
            state.jobs_v += 1;
        }
        StacksCompleted { job_id, .. } => {
            finish_job(state, job_id);
            state.stacks_v += 1;
            state.jobs_v += 1;
        }
        DuplicatesCompleted { job_id, .. } => {
            finish_job(state, job_id);
            state.duplicates_v += 1;
            state.jobs_v += 1;
        }
        FacesCompleted { job_id, .. } => {
            finish_job(state, job_id);
            state.people_v += 1;
            state.faces_v += 1;
            state.jobs_v += 1;
        }

        GroupsChanged { .. } => state.groups_v += 1,
        GroupIndexCompleted { .. } => state.groups_v += 1,

        TagsChanged { .. } => state.tags_v += 1,
        SettingsChanged { .. } => state.settings_v += 1,

        JobRegistered { job, .. } => {
            state.jobs.insert(job.job_id.clone(), job.clone());
            state.jobs_v += 1;
        }
        JobProgress { job_id, progress, message } => {
            if let Some(j) = state.jobs.get_mut(job_id) {
                j.progress = *progress;
                j.message = message.clone();
            }
        }
        JobFinished { job_id, status, message } => {
            if let Some(j) = state.jobs.get_mut(job_id) {
                j.status = status.clone();
                j.message = message.clone();
            }
            state.jobs_v += 1;
        }

        ErrorRaised { message, where_, .. } => {
            state.last_error = Some(if where_.is_empty() {
                message.clone()
            } else {
                format!("{where_}: {message}")
            });
        }
    }
}

fn finish_job(state: &mut ProjectState, job_id: &str) {
    if let Some(j) = state.jobs.get_mut(job_id) {
        j.status = "done".to_string();
        j.progress = 1.0;
    }
}

fn log_dispatch(
    action: &Action,
    old: &crate::state::VersionSnapshot,
    new: &crate::state::VersionSnapshot,
    n_subscribers: usize,
) {
    let deltas = old.deltas(new);
    let job_id = action.job_id().unwrap_or("");
    let source = &action.meta().source;

    if deltas.is_empty() {
        tracing::debug!(action = action.name(), job = job_id, src = %source, subscribers = n_subscribers, "dispatch");
    } else {
        tracing::info!(
            action = action.name(),
            job = job_id,
            src = %source,
            subscribers = n_subscribers,
            deltas = ?deltas,
            "dispatch"
        );
    }
}

pub fn init_with_defaults() -> Arc<Store> {
    Arc::new(Store::new(ProjectState::new()))
}
