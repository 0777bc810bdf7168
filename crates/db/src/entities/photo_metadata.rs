//! `photo_metadata` — one row per photo file. `(path, project_id)` is
//! unique. `created_year`/`month`/`day` are always populated (EXIF
//! `date_taken` when present, filesystem mtime otherwise) so grouping
//! queries never need to branch on a nullable date.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "photo_metadata")]
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
    Instances,
    Tags,
    FaceCrops,
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
            Self::Instances => Entity::has_many(super::media_instance::Entity).into(),
            Self::Tags => Entity::has_many(super::photo_tag::Entity).into(),
            Self::FaceCrops => Entity::has_many(super::face_crop::Entity).into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
