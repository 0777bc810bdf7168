//! End-to-end coverage of [`Engine::start`] wiring: every registered
//! runner actually runs, the action/version store receives dispatches,
//! and person-group / semantic-model migration flows work through the
//! public API rather than against individual crates.

mod support;

use std::time::Duration;

use aperture_engine::Engine;
use sea_orm::EntityTrait;
use uuid::Uuid;

async fn wait_for_terminal(engine: &Engine, job_id: Uuid) -> aperture_db::ml_job::Model {
    for _ in 0..100 {
        let row =
            aperture_db::MlJob::find_by_id(job_id.to_string()).one(engine.db()).await.expect("query").expect("row");
        if row.state.is_terminal() {
            return row;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

#[tokio::test]
async fn start_recovers_zombies_and_runs_duplicate_hash_job() {
    let (config, _store_dir, _scratch_dir) = support::test_config();
    let engine = Engine::start(config, support::bindings()).await.expect("engine start");

    let project_id = engine.create_project("trip", "/photos").await.expect("create project");
    let job_id = engine.enqueue_duplicate_hash(project_id).await.expect("enqueue");

    let finished = wait_for_terminal(&engine, job_id).await;
    assert_eq!(finished.state, aperture_db::ml_job::JobState::Done);

    engine.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn person_group_lifecycle_clears_stale_flag_after_group_index() {
    let (config, _store_dir, _scratch_dir) = support::test_config();
    let engine = Engine::start(config, support::bindings()).await.expect("engine start");
    let project_id = engine.create_project("family", "/photos").await.expect("create project");

    let group_id = engine.create_person_group(project_id, "kids").await.expect("create group");
    engine.add_group_member(group_id, "face_001").await.expect("add member");

    let job_id = engine.enqueue_group_index(project_id, group_id).await.expect("enqueue group_index");
    let finished = wait_for_terminal(&engine, job_id).await;
    assert_eq!(finished.state, aperture_db::ml_job::JobState::Done);

    let group =
        aperture_db::PersonGroup::find_by_id(group_id).one(engine.db()).await.expect("query group").unwrap();
    assert!(!group.stale, "group_index must clear the stale flag even with no matching photos");
}

#[tokio::test]
async fn migrate_semantic_model_updates_project_pointer_without_deleting_embeddings() {
    let (config, _store_dir, _scratch_dir) = support::test_config();
    let engine = Engine::start(config, support::bindings()).await.expect("engine start");
    let project_id = engine.create_project("archive", "/photos").await.expect("create project");

    let reindex = engine.migrate_semantic_model(project_id, "clip-vit-l14").await.expect("migrate model");
    assert!(reindex.is_empty(), "fresh project has no photos needing re-embed");

    let project =
        aperture_db::Project::find_by_id(project_id).one(engine.db()).await.expect("query project").unwrap();
    assert_eq!(project.semantic_model, "clip-vit-l14");
}

#[tokio::test]
async fn retry_job_rejects_an_already_terminal_job() {
    let (config, _store_dir, _scratch_dir) = support::test_config();
    let engine = Engine::start(config, support::bindings()).await.expect("engine start");
    let project_id = engine.create_project("retry", "/photos").await.expect("create project");

    let job_id = engine.enqueue_duplicate_group(project_id).await.expect("enqueue");
    wait_for_terminal(&engine, job_id).await;

    // Retrying an already-terminal job kind that needs no external
    // binding should be rejected rather than silently no-op.
    let result = engine.retry_job(job_id).await;
    assert!(result.is_err(), "retrying a job that already reached Done must not silently succeed");
}
