//! The persistent, crash-safe job manager (§4.7): leases `ml_job` rows,
//! runs the registered [`JobRunner`] for the row's kind, renews the
//! lease while running, and reconciles the terminal state back to
//! storage plus the action/version store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aperture_actions::{Action, Store};
use aperture_db::ml_job::JobState;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::error::JobSystemError;
use crate::handle::{ControlFlags, JobHandle};
use crate::kind::JobKind;
use crate::report::RateTracker;
use crate::runner::{JobOutcome, JobRunner};

/// Default lease duration (§4.7). A worker renews at `L/2`.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(60);

pub struct JobManager {
    db: DatabaseConnection,
    store: Arc<Store>,
    worker_id: String,
    runners: HashMap<JobKind, Arc<dyn JobRunner>>,
    global_semaphore: Arc<Semaphore>,
    per_kind_semaphores: HashMap<JobKind, Arc<Semaphore>>,
    global_pause: Arc<AtomicBool>,
    controls: parking_lot::Mutex<HashMap<Uuid, Arc<ControlFlags>>>,
}

impl JobManager {
    pub fn new(
        db: DatabaseConnection,
        store: Arc<Store>,
        runners: Vec<Arc<dyn JobRunner>>,
        global_concurrency: Option<usize>,
    ) -> Arc<Self> {
        let per_kind_semaphores = JobKind::ALL
            .into_iter()
            .map(|kind| (kind, Arc::new(Semaphore::new(kind.default_concurrency()))))
            .collect();

        let runners = runners.into_iter().map(|r| (r.kind(), r)).collect();

        Arc::new(Self {
            db,
            store,
            worker_id: Uuid::new_v4().to_string(),
            runners,
            global_semaphore: Arc::new(Semaphore::new(global_concurrency.unwrap_or_else(num_cpus::get))),
            per_kind_semaphores,
            global_pause: Arc::new(AtomicBool::new(false)),
            controls: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    /// Moves every `running` job whose lease has expired to `failed`
    /// with reason "crash recovery" (§4.1). Must run before [`Self::enqueue`]
    /// is called for the first time after process start.
    pub async fn recover_zombies(&self) -> Result<usize, JobSystemError> {
        let now = Utc::now();
        let zombies = aperture_db::MlJob::find()
            .filter(aperture_db::ml_job::Column::State.eq(JobState::Running))
            .all(&self.db)
            .await?;

        let mut recovered = 0;
        for row in zombies {
            let expired = row.lease_expires_at.map_or(true, |exp| exp < now);
            if !expired {
                continue;
            }

            let job_id = row.id.clone();
            let mut active: aperture_db::ml_job::ActiveModel = row.into();
            active.state = Set(JobState::Failed);
            active.error = Set(Some("crash recovery".to_string()));
            active.finished_at = Set(Some(now));
            active.updated_at = Set(now);
            active.lease_owner = Set(None);
            active.lease_expires_at = Set(None);
            active.update(&self.db).await?;

            let meta = self.store.make_meta("job_manager");
            self.store.dispatch(Action::JobFinished {
                meta,
                job_id: job_id.clone(),
                status: "failed".to_string(),
                message: "crash recovery".to_string(),
            });
            tracing::warn!(job_id, "recovered zombie job after expired lease");
            recovered += 1;
        }

        Ok(recovered)
    }

    /// Global pause: suspends acceptance of new work across every kind,
    /// used by the UI to yield resources during interactive work (§4.7).
    /// Already-running jobs are not interrupted by this flag.
    pub fn set_global_pause(&self, paused: bool) {
        self.global_pause.store(paused, Ordering::SeqCst);
    }

    pub async fn enqueue(
        self: &Arc<Self>,
        project_id: i64,
        kind: JobKind,
        config: serde_json::Value,
    ) -> Result<Uuid, JobSystemError> {
        if !self.runners.contains_key(&kind) {
            return Err(JobSystemError::NoRunner(kind.to_string()));
        }

        let job_id = Uuid::new_v4();
        let now = Utc::now();
        let active = aperture_db::ml_job::ActiveModel {
            id: Set(job_id.to_string()),
            kind: Set(kind.to_string()),
            project_id: Set(project_id),
            state: Set(JobState::Queued),
            processed: Set(0),
            total: Set(0),
            rate_per_sec: Set(0.0),
            message: Set(String::new()),
            started_at: Set(None),
            updated_at: Set(now),
            finished_at: Set(None),
            lease_owner: Set(None),
            lease_expires_at: Set(None),
            error: Set(None),
            config_json: Set(config.to_string()),
        };
        active.insert(&self.db).await?;

        let meta = self.store.make_meta("job_manager");
        self.store.dispatch(Action::JobRegistered {
            meta,
            job: aperture_actions::JobSnapshot::new(job_id.to_string(), kind.to_string(), kind.to_string()),
        });

        self.spawn(job_id, kind, project_id);
        Ok(job_id)
    }

    /// Resumes a `paused` job in place (not a new job id), per §4.7.
    pub async fn resume(self: &Arc<Self>, job_id: Uuid) -> Result<(), JobSystemError> {
        let row = aperture_db::MlJob::find_by_id(job_id.to_string())
            .one(&self.db)
            .await?
            .ok_or(JobSystemError::NotFound(job_id))?;

        if row.state != JobState::Paused {
            return Err(JobSystemError::InvalidTransition(job_id));
        }

        let kind: JobKind = row.kind.parse().map_err(|_| JobSystemError::NoRunner(row.kind.clone()))?;
        let project_id = row.project_id;
        self.spawn(job_id, kind, project_id);
        Ok(())
    }

    /// Requests pause of a running job. Only meaningful while running;
    /// the worker observes this at its next safe point.
    pub fn pause(&self, job_id: Uuid) -> Result<(), JobSystemError> {
        match self.controls.lock().get(&job_id) {
            Some(flags) => {
                flags.request_pause();
                Ok(())
            }
            None => Err(JobSystemError::InvalidTransition(job_id)),
        }
    }

    /// Cancels a job. If running, the worker observes this cooperatively;
    /// if only queued or paused, the transition is applied immediately
    /// since no worker is alive to observe it.
    pub async fn cancel(&self, job_id: Uuid) -> Result<(), JobSystemError> {
        if let Some(flags) = self.controls.lock().get(&job_id) {
            flags.request_cancel();
            return Ok(());
        }

        let row = aperture_db::MlJob::find_by_id(job_id.to_string())
            .one(&self.db)
            .await?
            .ok_or(JobSystemError::NotFound(job_id))?;

        if !matches!(row.state, JobState::Queued | JobState::Paused) {
            return Err(JobSystemError::InvalidTransition(job_id));
        }

        let now = Utc::now();
        let mut active: aperture_db::ml_job::ActiveModel = row.into();
        active.state = Set(JobState::Canceled);
        active.finished_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&self.db).await?;

        let meta = self.store.make_meta("job_manager");
        self.store.dispatch(Action::JobFinished {
            meta,
            job_id: job_id.to_string(),
            status: "canceled".to_string(),
            message: String::new(),
        });
        Ok(())
    }

    fn spawn(self: &Arc<Self>, job_id: Uuid, kind: JobKind, project_id: i64) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.run_one(job_id, kind, project_id).await {
                tracing::error!(job_id = %job_id, kind = %kind, error = %e, "job failed before it could be scheduled");
            }
        });
    }

    async fn run_one(self: Arc<Self>, job_id: Uuid, kind: JobKind, project_id: i64) -> Result<(), JobSystemError> {
        while self.global_pause.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        let _global_permit = Arc::clone(&self.global_semaphore)
            .acquire_owned()
            .await
            .expect("semaphore never closed");
        let kind_semaphore = self.per_kind_semaphores[&kind].clone();
        let _kind_permit = kind_semaphore.acquire_owned().await.expect("semaphore never closed");

        let runner = self.runners.get(&kind).cloned().ok_or_else(|| JobSystemError::NoRunner(kind.to_string()))?;

        let now = Utc::now();
        let row = aperture_db::MlJob::find_by_id(job_id.to_string())
            .one(&self.db)
            .await?
            .ok_or(JobSystemError::NotFound(job_id))?;
        let resumed_processed = row.processed.max(0) as u64;
        let resumed_rate = row.rate_per_sec.max(0.0);

        let mut active: aperture_db::ml_job::ActiveModel = row.into();
        active.state = Set(JobState::Running);
        active.lease_owner = Set(Some(self.worker_id.clone()));
        active.lease_expires_at = Set(Some(now + DEFAULT_LEASE));
        active.started_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&self.db).await?;

        let controls = Arc::new(ControlFlags::default());
        self.controls.lock().insert(job_id, Arc::clone(&controls));

        let handle = Arc::new(JobHandle {
            job_id,
            project_id,
            kind,
            db: self.db.clone(),
            store: Arc::clone(&self.store),
            controls: Arc::clone(&controls),
            tracker: parking_lot::Mutex::new(RateTracker::resume(resumed_processed, resumed_rate)),
        });

        let finished = Arc::new(AtomicBool::new(false));
        let lease_task = self.spawn_lease_renewal(job_id, Arc::clone(&finished));

        let outcome = runner.run(Arc::clone(&handle)).await;

        finished.store(true, Ordering::SeqCst);
        lease_task.abort();
        self.controls.lock().remove(&job_id);

        self.finalize(job_id, kind, outcome).await
    }

    fn spawn_lease_renewal(&self, job_id: Uuid, finished: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
        let db = self.db.clone();
        let worker_id = self.worker_id.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(DEFAULT_LEASE / 2).await;
                if finished.load(Ordering::SeqCst) {
                    return;
                }
                let now = Utc::now();
                if let Ok(Some(row)) = aperture_db::MlJob::find_by_id(job_id.to_string()).one(&db).await {
                    if row.lease_owner.as_deref() != Some(worker_id.as_str()) {
                        tracing::warn!(job_id = %job_id, "lease renewal found a different owner, stopping");
                        return;
                    }
                    let mut active: aperture_db::ml_job::ActiveModel = row.into();
                    active.lease_expires_at = Set(Some(now + DEFAULT_LEASE));
                    active.updated_at = Set(now);
                    let _ = active.update(&db).await;
                }
            }
        })
    }

    async fn finalize(
        &self,
        job_id: Uuid,
        kind: JobKind,
        outcome: Result<JobOutcome, JobSystemError>,
    ) -> Result<(), JobSystemError> {
        let now = Utc::now();
        let row = aperture_db::MlJob::find_by_id(job_id.to_string())
            .one(&self.db)
            .await?
            .ok_or(JobSystemError::NotFound(job_id))?;

        // A lease-loss situation means recovery already marked this job
        // failed out from under us; do not overwrite that verdict.
        if row.lease_owner.as_deref() != Some(self.worker_id.as_str()) {
            tracing::warn!(job_id = %job_id, "lease lost before finalize, leaving recovered state in place");
            return Ok(());
        }

        let mut active: aperture_db::ml_job::ActiveModel = row.into();
        let meta = self.store.make_meta("job_manager");

        match outcome {
            Ok(JobOutcome::Completed(stats)) => {
                active.state = Set(JobState::Done);
                active.finished_at = Set(Some(now));
                active.updated_at = Set(now);
                active.error = Set(None);
                active.update(&self.db).await?;

                self.store.dispatch(Action::JobFinished {
                    meta: meta.clone(),
                    job_id: job_id.to_string(),
                    status: "done".to_string(),
                    message: String::new(),
                });
                if let Some(action) = completion_action(kind, job_id.to_string(), meta, &stats) {
                    self.store.dispatch(action);
                }
            }
            Ok(JobOutcome::Paused) => {
                active.state = Set(JobState::Paused);
                active.updated_at = Set(now);
                active.lease_owner = Set(None);
                active.lease_expires_at = Set(None);
                active.update(&self.db).await?;

                self.store.dispatch(Action::JobFinished {
                    meta,
                    job_id: job_id.to_string(),
                    status: "paused".to_string(),
                    message: String::new(),
                });
            }
            Ok(JobOutcome::Canceled) => {
                active.state = Set(JobState::Canceled);
                active.finished_at = Set(Some(now));
                active.updated_at = Set(now);
                active.update(&self.db).await?;

                self.store.dispatch(Action::JobFinished {
                    meta,
                    job_id: job_id.to_string(),
                    status: "canceled".to_string(),
                    message: String::new(),
                });
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, kind = %kind, error = %e, "job failed");
                active.state = Set(JobState::Failed);
                active.finished_at = Set(Some(now));
                active.updated_at = Set(now);
                active.error = Set(Some(e.to_string()));
                active.update(&self.db).await?;

                self.store.dispatch(Action::JobFinished {
                    meta,
                    job_id: job_id.to_string(),
                    status: "failed".to_string(),
                    message: e.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Maps a finished job's stats blob to the domain-completion action for
/// its pipeline (§4.8). Only the terminal stage of a multi-stage
/// pipeline (faces cluster, duplicate group) carries a completion
/// action; earlier stages only bump `jobs_v` via `JobFinished`.
fn completion_action(
    kind: JobKind,
    job_id: String,
    meta: aperture_actions::ActionMeta,
    stats: &serde_json::Value,
) -> Option<Action> {
    let get = |key: &str| stats.get(key).and_then(|v| v.as_u64()).unwrap_or(0);

    match kind {
        JobKind::Scan => Some(Action::ScanCompleted {
            meta,
            job_id,
            photos_indexed: get("photos_indexed"),
            videos_indexed: get("videos_indexed"),
        }),
        JobKind::SemanticEmbed => Some(Action::EmbeddingsCompleted { meta, job_id, generated: get("generated") }),
        JobKind::FacesCluster => Some(Action::FacesCompleted {
            meta,
            job_id,
            detected: get("detected"),
            clustered: get("clustered"),
        }),
        JobKind::DuplicateGroup => Some(Action::DuplicatesCompleted {
            meta,
            job_id,
            exact_groups: get("exact_groups"),
            similar_stacks: get("similar_stacks"),
        }),
        JobKind::GroupIndex => Some(Action::GroupIndexCompleted {
            meta,
            group_id: stats.get("group_id").and_then(|v| v.as_i64()).unwrap_or(0),
            match_count: get("match_count"),
            scope: stats.get("scope").and_then(|v| v.as_str()).unwrap_or("same_photo").to_string(),
        }),
        JobKind::FacesDetect | JobKind::FacesEmbed | JobKind::DuplicateHash | JobKind::MtpCopy => None,
    }
}
