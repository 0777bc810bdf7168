//! Maintenance surface (§9 resolved open question 2): thumbnail/derived
//! caches are out of scope for generation here, but the core still owns
//! the "clear everything derived for project P" contract point so the
//! UI has exactly one supported operation after a bulk delete, instead
//! of reaching into storage directly.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::error::EngineError;

#[derive(Debug, Clone, serde::Serialize)]
pub struct ClearCachesReport {
    pub perceptual_hashes_cleared: u64,
    pub face_crops_reset: u64,
}

/// Clears perceptual hashes and resets face-crop embed state for a
/// project so the next duplicate/face pass recomputes from scratch.
/// Deletes nothing on disk beyond what the core owns — any thumbnail
/// directory is the caller's responsibility, matching the "core exposes
/// an operation the UI can call" contract from spec.md §6.
pub async fn clear_derived_caches(db: &DatabaseConnection, project_id: i64) -> Result<ClearCachesReport, EngineError> {
    let assets = aperture_db::MediaAsset::find()
        .filter(aperture_db::media_asset::Column::ProjectId.eq(project_id))
        .filter(aperture_db::media_asset::Column::PerceptualHash.is_not_null())
        .all(db)
        .await?;
    let perceptual_hashes_cleared = assets.len() as u64;
    for asset in assets {
        let mut active: aperture_db::media_asset::ActiveModel = asset.into();
        active.perceptual_hash = Set(None);
        active.update(db).await?;
    }

    let crops = aperture_db::FaceCrop::find()
        .filter(aperture_db::face_crop::Column::ProjectId.eq(project_id))
        .all(db)
        .await?;
    let face_crops_reset = crops.len() as u64;
    for crop in crops {
        let mut active: aperture_db::face_crop::ActiveModel = crop.into();
        active.embedding = Set(None);
        active.branch_key = Set(None);
        active.is_representative = Set(false);
        active.update(db).await?;
    }

    Ok(ClearCachesReport { perceptual_hashes_cleared, face_crops_reset })
}
