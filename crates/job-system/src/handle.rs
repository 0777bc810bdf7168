//! The handle a running job's own code sees: cooperative pause/cancel
//! signals and progress checkpointing (§4.7). Runners never touch the
//! `ml_job` row directly — they go through this handle so every write
//! also bumps `updated_at` and dispatches the matching action.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aperture_actions::{Action, Store};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use crate::error::JobSystemError;
use crate::kind::JobKind;
use crate::report::RateTracker;

/// Signal a runner should act on at its next safe point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Run,
    Pause,
    Cancel,
}

#[derive(Debug, Default)]
pub(crate) struct ControlFlags {
    pause: AtomicBool,
    cancel: AtomicBool,
}

impl ControlFlags {
    pub(crate) fn request_pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }

    pub(crate) fn request_resume(&self) {
        self.pause.store(false, Ordering::SeqCst);
    }

    pub(crate) fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    fn signal(&self) -> ControlSignal {
        if self.cancel.load(Ordering::SeqCst) {
            ControlSignal::Cancel
        } else if self.pause.load(Ordering::SeqCst) {
            ControlSignal::Pause
        } else {
            ControlSignal::Run
        }
    }
}

pub struct JobHandle {
    pub job_id: Uuid,
    pub project_id: i64,
    pub kind: JobKind,
    pub(crate) db: DatabaseConnection,
    pub(crate) store: Arc<Store>,
    pub(crate) controls: Arc<ControlFlags>,
    pub(crate) tracker: parking_lot::Mutex<RateTracker>,
}

impl JobHandle {
    /// Check at a safe point (between files, between batches). Returns
    /// the pending control signal without consuming it — callers decide
    /// how to unwind (finish the current unit of work first, then stop).
    pub fn poll_control(&self) -> ControlSignal {
        self.controls.signal()
    }

    pub fn is_canceled(&self) -> bool {
        self.poll_control() == ControlSignal::Cancel
    }

    /// Persist a progress tick: updates the `ml_job` row and dispatches
    /// `Action::JobProgress`. Does not change `state`.
    pub async fn checkpoint(
        &self,
        processed: u64,
        total: u64,
        message: impl Into<String>,
    ) -> Result<(), JobSystemError> {
        let message = message.into();
        let tick = self.tracker.lock().tick(processed, total, message.clone());

        let mut active: aperture_db::ml_job::ActiveModel = aperture_db::MlJob::find_by_id(self.job_id.to_string())
            .one(&self.db)
            .await?
            .ok_or(JobSystemError::NotFound(self.job_id))?
            .into();

        active.processed = Set(tick.processed as i64);
        active.total = Set(tick.total as i64);
        active.rate_per_sec = Set(tick.rate_per_sec);
        active.message = Set(tick.message.clone());
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?;

        let meta = self.store.make_meta(self.kind.as_str());
        self.store.dispatch(Action::JobProgress {
            meta,
            job_id: self.job_id.to_string(),
            progress: if tick.total > 0 { tick.processed as f64 / tick.total as f64 } else { 0.0 },
            message: tick.message,
        });

        Ok(())
    }
}
