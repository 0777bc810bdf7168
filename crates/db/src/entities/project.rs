//! `projects` — the top-level tenant. `semantic_model` is project metadata,
//! not a UI preference: changing it invalidates every existing semantic
//! embedding for the project (see `aperture-semantic`'s migration protocol).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub root_folder: String,
    pub mode: String,
    pub semantic_model: String,
    /// DBSCAN `eps` for face clustering; defaults copied from
    /// `global_settings.default_face_eps` at project creation.
    pub face_eps: f64,
    pub face_min_samples: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Folders,
    PhotoMetadata,
    Assets,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Folders => Entity::has_many(super::photo_folder::Entity).into(),
            Self::PhotoMetadata => Entity::has_many(super::photo_metadata::Entity).into(),
            Self::Assets => Entity::has_many(super::media_asset::Entity).into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
