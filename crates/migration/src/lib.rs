//! Forward-only, versioned migrations for the single embedded store
//! (§4.1). [`Migrator`] is the `sea-orm-migration` transport; [`run`] adds
//! the project's own policy on top: refuse to start if the store is
//! *ahead* of the code (`SchemaMismatch`), and run an idempotent
//! verification pass after applying pending migrations, aborting with
//! `MigrationFailed` (without updating `schema_version`) if it fails.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult, Statement};
use sea_orm_migration::{MigrationTrait, MigratorTrait};

mod m20260101_000001_create_core_schema;
mod m20260108_000002_project_face_clustering_params;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_core_schema::Migration),
            Box::new(m20260108_000002_project_face_clustering_params::Migration),
        ]
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MigrationError {
    #[error("store schema is ahead of this build's known migrations")]
    SchemaMismatch,
    #[error("migration verification failed: {0}")]
    MigrationFailed(String),
    #[error(transparent)]
    Db(#[from] DbErr),
}

const REQUIRED_TABLES: &[&str] = &[
    "projects",
    "photo_folders",
    "photo_metadata",
    "video_metadata",
    "media_asset",
    "media_instance",
    "face_crops",
    "face_branch_reps",
    "semantic_embeddings",
    "tags",
    "photo_tags",
    "ml_job",
    "schema_version",
];

/// Applies pending migrations and runs the verification pass. Call this
/// once at startup, before the job-system zombie recovery pass and
/// before any worker accepts jobs.
#[tracing::instrument(skip(conn))]
pub async fn run(conn: &DatabaseConnection) -> Result<(), MigrationError> {
    let known: std::collections::HashSet<String> =
        Migrator::migrations().iter().map(|m| m.name().to_string()).collect();

    let table_exists = conn
        .query_one(Statement::from_string(
            conn.get_database_backend(),
            "SELECT name FROM sqlite_master WHERE type='table' AND name='seaql_migrations';"
                .to_string(),
        ))
        .await?
        .is_some();

    if table_exists {
        #[derive(Debug, sea_orm::FromQueryResult)]
        struct AppliedRow {
            version: String,
        }
        let applied = AppliedRow::find_by_statement(Statement::from_string(
            conn.get_database_backend(),
            "SELECT version FROM seaql_migrations;".to_string(),
        ))
        .all(conn)
        .await?;

        if applied.iter().any(|row| !known.contains(&row.version)) {
            return Err(MigrationError::SchemaMismatch);
        }
    }

    Migrator::up(conn, None).await?;

    verify(conn).await.map_err(|e| {
        tracing::error!(error = %e, "migration verification failed, schema_version not advanced");
        MigrationError::MigrationFailed(e)
    })
}

/// Idempotent verification pass: confirms every table this codebase
/// expects exists, and that foreign-key enforcement is actually active.
async fn verify(conn: &DatabaseConnection) -> Result<(), String> {
    for table in REQUIRED_TABLES {
        let exists = conn
            .query_one(Statement::from_string(
                conn.get_database_backend(),
                format!(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name='{table}';"
                ),
            ))
            .await
            .map_err(|e| e.to_string())?
            .is_some();
        if !exists {
            return Err(format!("expected table `{table}` missing after migration"));
        }
    }

    if !aperture_db::foreign_keys_enabled(conn).await.map_err(|e| e.to_string())? {
        return Err("foreign_keys pragma not enabled on verification connection".to_string());
    }

    Ok(())
}
