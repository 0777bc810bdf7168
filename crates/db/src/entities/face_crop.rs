//! `face_crops` — one row per detection. `image_path` MUST point at an
//! original media file, never at a derived crop file (§3, §8 invariant 2,
//! §9 open question — enforced by [`validate_image_path`] on every write
//! and audited for legacy rows by `aperture-faces::maintenance`).

use sea_orm::entity::prelude::*;

pub const CROP_STORE_SEGMENT: &str = "/.crops/";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "face_crops")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub project_id: i64,
    pub photo_id: i64,
    pub branch_key: Option<String>,
    pub image_path: String,
    pub crop_path: Option<String>,
    pub embedding: Option<Vec<u8>>,
    pub confidence: f64,
    pub low_confidence: bool,
    pub bbox_top: f64,
    pub bbox_right: f64,
    pub bbox_bottom: f64,
    pub bbox_left: f64,
    pub is_representative: bool,
    pub detector_version: String,
}

/// Returns `Err` if `image_path` contains the crop-store path segment —
/// the corruption class called out in spec §9.
pub fn validate_image_path(image_path: &str) -> Result<(), String> {
    if image_path.contains(CROP_STORE_SEGMENT) {
        return Err(format!(
            "face_crops.image_path must reference an original media file, got {image_path}"
        ));
    }
    Ok(())
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Project,
    Photo,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Project => Entity::belongs_to(super::project::Entity)
                .from(Column::ProjectId)
                .to(super::project::Column::Id)
                .into(),
            Self::Photo => Entity::belongs_to(super::photo_metadata::Entity)
                .from(Column::PhotoId)
                .to(super::photo_metadata::Column::Id)
                .into(),
        }
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: sea_orm::ConnectionTrait,
    {
        if let sea_orm::ActiveValue::Set(ref path) | sea_orm::ActiveValue::Unchanged(ref path) =
            self.image_path
        {
            validate_image_path(path).map_err(DbErr::Custom)?;
        }
        Ok(self)
    }
}
