//! Adds per-project DBSCAN clustering parameters (`face_eps`,
//! `face_min_samples`) to `projects`, seeded from `global_settings`'
//! defaults. `ADD COLUMN` is guarded by a `PRAGMA table_info` check so
//! the migration is idempotent at the column level (§4.1), mirroring
//! `original_source/migrations/migration_v9_1_semantic_model.py`'s
//! `check_column_exists`.

use sea_orm::FromQueryResult;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const DEFAULT_EPS: f64 = 0.35;
const DEFAULT_MIN_SAMPLES: i32 = 3;

async fn column_exists(manager: &SchemaManager<'_>, table: &str, column: &str) -> Result<bool, DbErr> {
    #[derive(Debug, sea_orm::FromQueryResult)]
    struct TableInfoRow {
        name: String,
    }

    let rows = TableInfoRow::find_by_statement(sea_orm::Statement::from_string(
        manager.get_database_backend(),
        format!("PRAGMA table_info({table});"),
    ))
    .all(manager.get_connection())
    .await?;

    Ok(rows.iter().any(|r| r.name == column))
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if !column_exists(manager, "projects", "face_eps").await? {
            manager
                .get_connection()
                .execute_unprepared(&format!(
                    "ALTER TABLE projects ADD COLUMN face_eps REAL NOT NULL DEFAULT {DEFAULT_EPS};"
                ))
                .await?;
        } else {
            tracing::info!("projects.face_eps already present, skipping");
        }

        if !column_exists(manager, "projects", "face_min_samples").await? {
            manager
                .get_connection()
                .execute_unprepared(&format!(
                    "ALTER TABLE projects ADD COLUMN face_min_samples INTEGER NOT NULL DEFAULT {DEFAULT_MIN_SAMPLES};"
                ))
                .await?;
        } else {
            tracing::info!("projects.face_min_samples already present, skipping");
        }

        manager
            .get_connection()
            .execute_unprepared(&format!(
                r#"
                INSERT INTO global_settings (key, value) VALUES ('default_face_eps', '{DEFAULT_EPS}')
                ON CONFLICT(key) DO NOTHING;
                INSERT INTO global_settings (key, value) VALUES ('default_face_min_samples', '{DEFAULT_MIN_SAMPLES}')
                ON CONFLICT(key) DO NOTHING;
                "#
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        // SQLite can't drop columns pre-3.35 without a table rebuild; this
        // migration is additive-only and intentionally has no safe down.
        Ok(())
    }
}
