//! `video_metadata` — mirrors `photo_metadata` plus duration/codec/fps/
//! bitrate. Kept as a separate table (rather than nullable video columns
//! bolted onto `photo_metadata`) because the two kinds diverge in their
//! derivation pipeline (§4.2: photos normalize EXIF orientation before
//! hashing, video hashes raw bytes).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "video_metadata")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub path: String,
    pub folder_id: i64,
    pub project_id: i64,

    pub size_kb: i64,
    pub modified: DateTimeUtc,
    pub date_taken: Option<DateTimeUtc>,
    pub created_ts: DateTimeUtc,
    pub created_year: i32,
    pub created_month: i32,
    pub created_day: i32,

    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_seconds: Option<f64>,
    pub codec: Option<String>,
    pub fps: Option<f64>,
    pub bitrate: Option<i64>,

    pub rating: Option<i32>,
    pub favorite: bool,
    pub missing: bool,

    pub metadata_fail_count: i32,
    pub last_error: Option<String>,

    pub faces_status: String,
    pub embed_status: String,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Project,
    Folder,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Project => Entity::belongs_to(super::project::Entity)
                .from(Column::ProjectId)
                .to(super::project::Column::Id)
                .into(),
            Self::Folder => Entity::belongs_to(super::photo_folder::Entity)
                .from(Column::FolderId)
                .to(super::photo_folder::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
