//! Exact-duplicate grouping (§4.3): free to compute because the asset
//! table is already content-addressed — this is a single aggregation
//! over `media_instance`, not a recompute.

use std::collections::HashMap;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::error::DedupError;

#[derive(Debug, Clone)]
pub struct ExactDuplicateGroup {
    pub asset_id: i64,
    pub instance_ids: Vec<i64>,
    pub earliest_modified: chrono::DateTime<chrono::Utc>,
}

/// Groups instances by `asset_id`, keeping only groups with 2+ members.
/// Sorted by instance count descending, ties broken by earliest
/// modified time (§4.3).
pub async fn exact_duplicate_groups(
    db: &DatabaseConnection,
    project_id: i64,
) -> Result<Vec<ExactDuplicateGroup>, DedupError> {
    let instances = aperture_db::MediaInstance::find()
        .filter(aperture_db::media_instance::Column::ProjectId.eq(project_id))
        .all(db)
        .await?;

    let mut by_asset: HashMap<i64, Vec<aperture_db::media_instance::Model>> = HashMap::new();
    for instance in instances {
        by_asset.entry(instance.asset_id).or_default().push(instance);
    }

    let mut groups = Vec::new();
    for (asset_id, members) in by_asset {
        if members.len() < 2 {
            continue;
        }

        let mut earliest = chrono::DateTime::<chrono::Utc>::MAX_UTC;
        for member in &members {
            if let Some(photo) = aperture_db::PhotoMetadata::find_by_id(member.photo_id).one(db).await? {
                earliest = earliest.min(photo.modified);
            } else if let Some(video) = aperture_db::VideoMetadata::find_by_id(member.photo_id).one(db).await? {
                earliest = earliest.min(video.modified);
            }
        }

        groups.push(ExactDuplicateGroup {
            asset_id,
            instance_ids: members.iter().map(|m| m.instance_id).collect(),
            earliest_modified: earliest,
        });
    }

    groups.sort_by(|a, b| b.instance_ids.len().cmp(&a.instance_ids.len()).then(a.earliest_modified.cmp(&b.earliest_modified)));

    Ok(groups)
}
