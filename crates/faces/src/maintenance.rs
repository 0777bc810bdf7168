//! Face-crop legacy-path audit-and-repair utility (§9). Some historical
//! rows wrote `image_path` pointing at the derived crop file instead of
//! the original photo, crashing manual-crop flows. Recovery mirrors the
//! original audit script: strip the `_faceN` suffix off the crop
//! filename and look for a matching original path.

use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use aperture_db::face_crop::{validate_image_path, CROP_STORE_SEGMENT};

#[derive(Debug, Default, serde::Serialize)]
pub struct AuditReport {
    pub total_checked: u64,
    pub corrupted: u64,
    pub repaired: u64,
    pub unrecoverable: u64,
}

pub async fn audit_and_repair(db: &DatabaseConnection, project_id: i64) -> Result<AuditReport, sea_orm::DbErr> {
    let crops = aperture_db::FaceCrop::find()
        .filter(aperture_db::face_crop::Column::ProjectId.eq(project_id))
        .all(db)
        .await?;

    let mut report = AuditReport { total_checked: crops.len() as u64, ..Default::default() };

    for crop in crops {
        if validate_image_path(&crop.image_path).is_ok() {
            continue;
        }
        report.corrupted += 1;

        let recovered = recover_original_path(db, project_id, &crop).await?;
        let repaired = recovered.is_some();
        if let Some(original_path) = recovered {
            let mut active: aperture_db::face_crop::ActiveModel = crop.clone().into();
            active.image_path = Set(original_path);
            active.update(db).await?;
            report.repaired += 1;
        } else {
            report.unrecoverable += 1;
        }

        let audit_row = aperture_db::maintenance_audit::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            project_id: Set(project_id),
            kind: Set("face_crop_image_path_corruption".to_string()),
            detail: Set(format!("face_crops.id={} image_path={}", crop.id, crop.image_path)),
            repaired: Set(repaired),
            created_at: Set(chrono::Utc::now()),
        };
        audit_row.insert(db).await?;
    }

    Ok(report)
}

async fn recover_original_path(
    db: &DatabaseConnection,
    project_id: i64,
    crop: &aperture_db::face_crop::Model,
) -> Result<Option<String>, sea_orm::DbErr> {
    let Some(crop_path) = &crop.crop_path else { return Ok(None) };
    let Some(basename) = std::path::Path::new(crop_path).file_stem().and_then(|s| s.to_str()) else {
        return Ok(None);
    };
    let Some(original_basename) = basename.split("_face").next() else { return Ok(None) };
    if original_basename.is_empty() || original_basename == basename {
        return Ok(None);
    }

    let candidates = aperture_db::PhotoMetadata::find()
        .filter(aperture_db::photo_metadata::Column::ProjectId.eq(project_id))
        .all(db)
        .await?;

    Ok(candidates
        .into_iter()
        .find(|p| std::path::Path::new(&p.path).file_stem().and_then(|s| s.to_str()) == Some(original_basename))
        .map(|p| p.path))
}

/// Rejects a write containing the crop-store path segment outright,
/// rather than persisting another corrupt row (§9 prevention half of
/// the fix — `face_crop::ActiveModelBehavior::before_save` enforces the
/// same check at the ORM layer; this is the explicit pre-check API).
pub fn check_new_image_path(path: &str) -> Result<(), String> {
    if path.contains(CROP_STORE_SEGMENT) {
        return Err(format!("rejected: image_path must not reference the crop store ({path})"));
    }
    Ok(())
}
