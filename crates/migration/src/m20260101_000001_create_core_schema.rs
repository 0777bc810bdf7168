//! Creates the full initial schema: projects, folders, media metadata,
//! the content-addressable asset/instance layer, faces, tags, jobs and
//! the schema-version log. Grounded on the content-first ordering called
//! out in spec §9: the asset/instance layer is foundational, paths are
//! properties of instances, not identities.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Projects::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::RootFolder).string().not_null())
                    .col(ColumnDef::new(Projects::Mode).string().not_null())
                    .col(ColumnDef::new(Projects::SemanticModel).string().not_null())
                    .col(ColumnDef::new(Projects::CreatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PhotoFolders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PhotoFolders::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(PhotoFolders::ParentId).big_integer())
                    .col(ColumnDef::new(PhotoFolders::Path).string().not_null())
                    .col(ColumnDef::new(PhotoFolders::Name).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_folder_parent")
                            .from(PhotoFolders::Table, PhotoFolders::ParentId)
                            .to(PhotoFolders::Table, PhotoFolders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX idx_folder_parent_name ON photo_folders (parent_id, name);",
            )
            .await?;

        for (table, extra_cols): (&str, &str) in [
            ("photo_metadata", ""),
            (
                "video_metadata",
                ", duration_seconds REAL, codec TEXT, fps REAL, bitrate BIGINT",
            ),
        ] {
            manager
                .get_connection()
                .execute_unprepared(&format!(
                    r#"
                    CREATE TABLE {table} (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        path TEXT NOT NULL,
                        folder_id BIGINT NOT NULL REFERENCES photo_folders(id) ON DELETE CASCADE,
                        project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                        size_kb BIGINT NOT NULL,
                        modified TIMESTAMP NOT NULL,
                        date_taken TIMESTAMP,
                        created_ts TIMESTAMP NOT NULL,
                        created_year INTEGER NOT NULL,
                        created_month INTEGER NOT NULL,
                        created_day INTEGER NOT NULL,
                        width INTEGER,
                        height INTEGER,
                        rating INTEGER,
                        favorite BOOLEAN NOT NULL DEFAULT FALSE,
                        missing BOOLEAN NOT NULL DEFAULT FALSE,
                        metadata_fail_count INTEGER NOT NULL DEFAULT 0,
                        last_error TEXT,
                        faces_status TEXT NOT NULL DEFAULT 'pending',
                        embed_status TEXT NOT NULL DEFAULT 'pending'
                        {extra_cols}
                    );
                    "#
                ))
                .await?;
            manager
                .get_connection()
                .execute_unprepared(&format!(
                    "CREATE UNIQUE INDEX idx_{table}_path_project ON {table} (path, project_id);"
                ))
                .await?;
            manager
                .get_connection()
                .execute_unprepared(&format!(
                    "CREATE INDEX idx_{table}_project ON {table} (project_id);"
                ))
                .await?;
        }

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE media_asset (
                    asset_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    content_hash TEXT NOT NULL,
                    perceptual_hash BIGINT,
                    representative_photo_id BIGINT NOT NULL
                );
                CREATE UNIQUE INDEX idx_asset_project_hash ON media_asset (project_id, content_hash);

                CREATE TABLE media_instance (
                    instance_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    asset_id BIGINT NOT NULL REFERENCES media_asset(asset_id) ON DELETE CASCADE,
                    photo_id BIGINT NOT NULL,
                    path TEXT NOT NULL
                );
                CREATE UNIQUE INDEX idx_instance_project_asset_path ON media_instance (project_id, asset_id, path);
                CREATE INDEX idx_instance_asset_project ON media_instance (asset_id, project_id);
                "#,
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE face_crops (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    photo_id BIGINT NOT NULL,
                    branch_key TEXT,
                    image_path TEXT NOT NULL,
                    crop_path TEXT,
                    embedding BLOB,
                    confidence REAL NOT NULL,
                    low_confidence BOOLEAN NOT NULL DEFAULT FALSE,
                    bbox_top REAL NOT NULL,
                    bbox_right REAL NOT NULL,
                    bbox_bottom REAL NOT NULL,
                    bbox_left REAL NOT NULL,
                    is_representative BOOLEAN NOT NULL DEFAULT FALSE,
                    detector_version TEXT NOT NULL,
                    CHECK (image_path NOT LIKE '%/.crops/%')
                );
                CREATE INDEX idx_face_crops_project_branch ON face_crops (project_id, branch_key);
                CREATE INDEX idx_face_crops_image_path ON face_crops (image_path);

                CREATE TABLE face_branch_reps (
                    project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    branch_key TEXT NOT NULL,
                    label TEXT,
                    count INTEGER NOT NULL DEFAULT 0,
                    rep_path TEXT,
                    rep_thumb_png BLOB,
                    quality_score REAL NOT NULL DEFAULT 0,
                    PRIMARY KEY (project_id, branch_key)
                );

                CREATE TABLE person_group (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    stale BOOLEAN NOT NULL DEFAULT FALSE
                );
                CREATE TABLE person_group_member (
                    group_id BIGINT NOT NULL REFERENCES person_group(id) ON DELETE CASCADE,
                    branch_key TEXT NOT NULL,
                    PRIMARY KEY (group_id, branch_key)
                );
                CREATE TABLE person_group_match_cache (
                    group_id BIGINT NOT NULL REFERENCES person_group(id) ON DELETE CASCADE,
                    photo_id BIGINT NOT NULL,
                    PRIMARY KEY (group_id, photo_id)
                );
                "#,
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE semantic_embeddings (
                    photo_id BIGINT NOT NULL,
                    model TEXT NOT NULL,
                    embedding BLOB NOT NULL,
                    dim INTEGER NOT NULL,
                    source_hash TEXT NOT NULL,
                    source_mtime TIMESTAMP NOT NULL,
                    PRIMARY KEY (photo_id, model)
                );
                CREATE INDEX idx_semantic_embeddings_model ON semantic_embeddings (model);

                CREATE TABLE tags (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE
                );
                CREATE UNIQUE INDEX idx_tags_name_project ON tags (name, project_id);

                CREATE TABLE photo_tags (
                    photo_id BIGINT NOT NULL,
                    tag_id BIGINT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    PRIMARY KEY (photo_id, tag_id)
                );

                CREATE TABLE asset_stack (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    representative_asset_id BIGINT NOT NULL
                );
                CREATE TABLE asset_stack_member (
                    stack_id BIGINT NOT NULL REFERENCES asset_stack(id) ON DELETE CASCADE,
                    asset_id BIGINT NOT NULL,
                    PRIMARY KEY (stack_id, asset_id)
                );

                CREATE TABLE maintenance_audit (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    kind TEXT NOT NULL,
                    detail TEXT NOT NULL,
                    repaired BOOLEAN NOT NULL DEFAULT FALSE,
                    created_at TIMESTAMP NOT NULL
                );

                CREATE TABLE global_settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE ml_job (
                    id TEXT PRIMARY KEY,
                    kind TEXT NOT NULL,
                    project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    state TEXT NOT NULL,
                    processed BIGINT NOT NULL DEFAULT 0,
                    total BIGINT NOT NULL DEFAULT 0,
                    rate_per_sec REAL NOT NULL DEFAULT 0,
                    message TEXT NOT NULL DEFAULT '',
                    started_at TIMESTAMP,
                    updated_at TIMESTAMP NOT NULL,
                    finished_at TIMESTAMP,
                    lease_owner TEXT,
                    lease_expires_at TIMESTAMP,
                    error TEXT,
                    config_json TEXT NOT NULL DEFAULT '{}'
                );
                CREATE INDEX idx_ml_job_state_kind ON ml_job (state, kind);
                CREATE INDEX idx_ml_job_lease_expires ON ml_job (lease_expires_at);

                CREATE TABLE schema_version (
                    version TEXT PRIMARY KEY,
                    applied_at TIMESTAMP NOT NULL,
                    description TEXT NOT NULL
                );
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            "schema_version", "ml_job", "global_settings", "maintenance_audit",
            "asset_stack_member", "asset_stack", "photo_tags", "tags",
            "semantic_embeddings", "person_group_match_cache", "person_group_member",
            "person_group", "face_branch_reps", "face_crops", "media_instance",
            "media_asset", "video_metadata", "photo_metadata",
        ] {
            manager
                .get_connection()
                .execute_unprepared(&format!("DROP TABLE IF EXISTS {table};"))
                .await?;
        }
        manager
            .drop_table(Table::drop().table(PhotoFolders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
    Name,
    RootFolder,
    Mode,
    SemanticModel,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PhotoFolders {
    Table,
    Id,
    ParentId,
    Path,
    Name,
}
