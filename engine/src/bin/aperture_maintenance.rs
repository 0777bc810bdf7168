//! `aperture-maintenance` (expansion, §9 maintenance surface): the one
//! supported CLI entry point for maintenance operations, replacing the
//! ad hoc `fix_*.py`/`diagnose_*.py` scripts this codebase grew out of.
//!
//! Runs with no ML model bindings configured, so `retry-job` only works
//! for job kinds that need none (`scan`, `duplicate_hash`,
//! `duplicate_group`, `faces_cluster`, `group_index`); retrying a
//! `faces_detect`, `faces_embed`, `semantic_embed`, or `mtp_copy` job
//! requires the full application process, which supplies the real
//! detector/embedder/encoder/device bindings.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "aperture-maintenance", about = "Maintenance operations for an Aperture project store")]
struct Cli {
    /// Path to the engine's TOML config file.
    #[arg(long, default_value = "aperture.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clears perceptual hashes and face-crop embeddings so the next
    /// pass recomputes duplicates/faces from scratch.
    ClearDerivedCaches { project_id: i64 },
    /// Scans `face_crops.image_path` for legacy corruption and repairs
    /// recoverable rows.
    AuditFaceCrops {
        project_id: i64,
        #[arg(long)]
        repair: bool,
    },
    /// Resumes a paused job, or reschedules a job that needs no ML
    /// model bindings (see module docs).
    RetryJob { job_id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = aperture_engine::EngineConfig::load(&cli.config)?;
    let db = aperture_db::connect(&config.store_path).await?;
    aperture_migration::run(&db).await?;

    match cli.command {
        Command::ClearDerivedCaches { project_id } => {
            let report = aperture_engine::clear_derived_caches(&db, project_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::AuditFaceCrops { project_id, repair } => {
            if !repair {
                println!("note: audit always repairs recoverable rows; --repair is accepted for clarity but has no separate dry-run mode yet");
            }
            let report = aperture_faces::audit_and_repair(&db, project_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::RetryJob { job_id } => {
            let store = aperture_actions::init_with_defaults();
            let runners: Vec<Arc<dyn aperture_job_system::JobRunner>> = vec![
                Arc::new(aperture_ingest::ScanRunner::new(db.clone())),
                Arc::new(aperture_dedup::DuplicateHashRunner::new(db.clone())),
                Arc::new(aperture_dedup::DuplicateGroupRunner::new(db.clone())),
                Arc::new(aperture_faces::FacesClusterRunner::new(db.clone())),
                Arc::new(aperture_faces::GroupIndexRunner::new(db.clone())),
            ];
            let jobs = aperture_job_system::JobManager::new(db.clone(), store, runners, config.global_concurrency);
            jobs.recover_zombies().await?;
            jobs.resume(job_id).await?;
            println!("resumed job {job_id}");
        }
    }

    Ok(())
}
