//! Stack persistence (§4.3 expansion): `asset_stack`/`asset_stack_member`
//! durably record similar-photo clustering so the representative pointer
//! and "unstack" removals survive a reclustering pass. Reclustering only
//! ever grows membership for an existing stack (by overlap with its
//! current members) or creates a brand-new stack for a cluster with no
//! overlap — it never deletes members on its own, which is what keeps an
//! explicit unstack sticky as long as at least one original member stays
//! put. See `DESIGN.md` for the tradeoff this simplification accepts.

use std::collections::HashMap;

use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::error::DedupError;
use crate::similar::SimilarStack;

pub async fn persist_stacks(db: &DatabaseConnection, project_id: i64, computed: Vec<SimilarStack>) -> Result<u64, DedupError> {
    let existing_members = aperture_db::AssetStackMember::find().all(db).await?;
    let existing_stacks = aperture_db::AssetStack::find()
        .filter(aperture_db::asset_stack::Column::ProjectId.eq(project_id))
        .all(db)
        .await?;
    let stack_ids: std::collections::HashSet<i64> = existing_stacks.iter().map(|s| s.id).collect();

    let mut members_by_stack: HashMap<i64, Vec<i64>> = HashMap::new();
    for member in &existing_members {
        if stack_ids.contains(&member.stack_id) {
            members_by_stack.entry(member.stack_id).or_default().push(member.asset_id);
        }
    }

    let mut asset_to_stack: HashMap<i64, i64> = HashMap::new();
    for (stack_id, assets) in &members_by_stack {
        for asset_id in assets {
            asset_to_stack.insert(*asset_id, *stack_id);
        }
    }

    let txn = aperture_db::begin_immediate(db).await?;
    let mut created = 0u64;

    for cluster in computed {
        let mut overlapping_stacks: Vec<i64> =
            cluster.asset_ids.iter().filter_map(|id| asset_to_stack.get(id).copied()).collect();
        overlapping_stacks.sort_unstable();
        overlapping_stacks.dedup();

        match overlapping_stacks.split_first() {
            Some((&primary, rest)) => {
                // A cluster that bridges two previously-separate stacks merges
                // them into the lowest-id one instead of leaving an asset
                // claimed by two stacks at once.
                for &other_stack_id in rest {
                    let other_members = members_by_stack.get(&other_stack_id).cloned().unwrap_or_default();
                    for asset_id in other_members {
                        aperture_db::AssetStackMember::delete_by_id((other_stack_id, asset_id)).exec(&txn).await?;
                        let member =
                            aperture_db::asset_stack_member::ActiveModel { stack_id: Set(primary), asset_id: Set(asset_id) };
                        member.insert(&txn).await?;
                        asset_to_stack.insert(asset_id, primary);
                    }
                    aperture_db::AssetStack::delete_by_id(other_stack_id).exec(&txn).await?;
                }
                let merged: Vec<i64> = members_by_stack.remove(&primary).unwrap_or_default().into_iter().chain(
                    rest.iter().flat_map(|s| members_by_stack.remove(s).unwrap_or_default())
                ).collect();
                members_by_stack.insert(primary, merged.clone());

                for asset_id in &cluster.asset_ids {
                    if !merged.contains(asset_id) {
                        let member = aperture_db::asset_stack_member::ActiveModel {
                            stack_id: Set(primary),
                            asset_id: Set(*asset_id),
                        };
                        member.insert(&txn).await?;
                        members_by_stack.get_mut(&primary).unwrap().push(*asset_id);
                        asset_to_stack.insert(*asset_id, primary);
                    }
                }
            }
            None => {
                let representative = pick_representative(&txn, &cluster.asset_ids).await?;
                let stack = aperture_db::asset_stack::ActiveModel {
                    id: sea_orm::ActiveValue::NotSet,
                    project_id: Set(project_id),
                    representative_asset_id: Set(representative),
                };
                let saved = stack.insert(&txn).await?;
                for asset_id in &cluster.asset_ids {
                    let member = aperture_db::asset_stack_member::ActiveModel {
                        stack_id: Set(saved.id),
                        asset_id: Set(*asset_id),
                    };
                    member.insert(&txn).await?;
                    asset_to_stack.insert(*asset_id, saved.id);
                }
                members_by_stack.insert(saved.id, cluster.asset_ids.clone());
                created += 1;
            }
        }
    }

    txn.commit().await?;
    Ok(created)
}

async fn pick_representative(db: &impl sea_orm::ConnectionTrait, asset_ids: &[i64]) -> Result<i64, DedupError> {
    let mut best: Option<(i64, i64)> = None; // (count, asset_id)
    for &asset_id in asset_ids {
        let count = aperture_db::MediaInstance::find()
            .filter(aperture_db::media_instance::Column::AssetId.eq(asset_id))
            .all(db)
            .await?
            .len() as i64;
        best = Some(match best {
            Some((best_count, best_id)) if best_count > count || (best_count == count && best_id < asset_id) => (best_count, best_id),
            _ => (count, asset_id),
        });
    }
    Ok(best.map(|(_, id)| id).unwrap_or(asset_ids[0]))
}

/// Removes `asset_id` from `stack_id`. If this leaves fewer than 2
/// members, the stack collapses entirely (§4.3).
pub async fn unstack(db: &DatabaseConnection, stack_id: i64, asset_id: i64) -> Result<(), DedupError> {
    let stack = aperture_db::AssetStack::find_by_id(stack_id).one(db).await?.ok_or(DedupError::StackNotFound(stack_id))?;

    let members = aperture_db::AssetStackMember::find()
        .filter(aperture_db::asset_stack_member::Column::StackId.eq(stack_id))
        .all(db)
        .await?;
    if !members.iter().any(|m| m.asset_id == asset_id) {
        return Err(DedupError::NotAMember(asset_id, stack_id));
    }

    aperture_db::AssetStackMember::delete_by_id((stack_id, asset_id)).exec(db).await?;

    let remaining: Vec<_> = members.iter().filter(|m| m.asset_id != asset_id).collect();
    if remaining.len() < 2 {
        for member in remaining {
            aperture_db::AssetStackMember::delete_by_id((stack_id, member.asset_id)).exec(db).await?;
        }
        aperture_db::AssetStack::delete_by_id(stack_id).exec(db).await?;
        return Ok(());
    }

    if stack.representative_asset_id == asset_id {
        let new_rep = remaining.iter().map(|m| m.asset_id).min().unwrap();
        let mut active: aperture_db::asset_stack::ActiveModel = stack.into();
        active.representative_asset_id = Set(new_rep);
        active.update(db).await?;
    }

    Ok(())
}

/// Mutates only the stack's representative pointer (§4.3).
pub async fn set_representative(db: &DatabaseConnection, stack_id: i64, asset_id: i64) -> Result<(), DedupError> {
    let stack = aperture_db::AssetStack::find_by_id(stack_id).one(db).await?.ok_or(DedupError::StackNotFound(stack_id))?;

    let is_member = aperture_db::AssetStackMember::find()
        .filter(aperture_db::asset_stack_member::Column::StackId.eq(stack_id))
        .filter(aperture_db::asset_stack_member::Column::AssetId.eq(asset_id))
        .one(db)
        .await?
        .is_some();
    if !is_member {
        return Err(DedupError::NotAMember(asset_id, stack_id));
    }

    let mut active: aperture_db::asset_stack::ActiveModel = stack.into();
    active.representative_asset_id = Set(asset_id);
    active.update(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::similar::SimilarStack;

    async fn test_db() -> DatabaseConnection {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        let db = aperture_db::connect(file.path()).await.expect("connect");
        aperture_migration::run(&db).await.expect("migrate");
        std::mem::forget(file);
        db
    }

    async fn seed_project(db: &DatabaseConnection) -> i64 {
        let project = aperture_db::project::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            name: Set("test".to_string()),
            root_folder: Set("/root".to_string()),
            mode: Set("local".to_string()),
            semantic_model: Set("clip-vit-b32".to_string()),
            face_eps: Set(0.35),
            face_min_samples: Set(3),
            created_at: Set(Utc::now()),
        };
        project.insert(db).await.expect("insert project").id
    }

    /// Seeds a bare `media_asset` row with no backing photo — stack
    /// persistence only ever reads `asset_id`/instance counts, so a
    /// photo/instance graph isn't needed for these tests.
    async fn seed_asset(db: &DatabaseConnection, project_id: i64, tag: &str) -> i64 {
        aperture_db::media_asset::ActiveModel {
            asset_id: sea_orm::ActiveValue::NotSet,
            project_id: Set(project_id),
            content_hash: Set(format!("hash_{tag}")),
            perceptual_hash: Set(None),
            representative_photo_id: Set(0),
        }
        .insert(db)
        .await
        .expect("insert asset")
        .asset_id
    }

    #[tokio::test]
    async fn bridging_cluster_merges_two_existing_stacks_without_dual_membership() {
        let db = test_db().await;
        let project_id = seed_project(&db).await;
        let a = seed_asset(&db, project_id, "a").await;
        let b = seed_asset(&db, project_id, "b").await;
        let c = seed_asset(&db, project_id, "c").await;

        persist_stacks(&db, project_id, vec![SimilarStack { asset_ids: vec![a] }]).await.expect("seed stack a");
        persist_stacks(&db, project_id, vec![SimilarStack { asset_ids: vec![b] }]).await.expect("seed stack b");

        // `c` bridges the two single-asset stacks into one cluster.
        let created = persist_stacks(&db, project_id, vec![SimilarStack { asset_ids: vec![a, b, c] }])
            .await
            .expect("merge");
        assert_eq!(created, 0, "a bridging cluster merges existing stacks, it doesn't create a new one");

        let members = aperture_db::AssetStackMember::find().all(&db).await.expect("query members");
        assert_eq!(members.len(), 3, "every asset must belong to exactly one stack after the merge");

        let stack_ids: std::collections::HashSet<i64> = members.iter().map(|m| m.stack_id).collect();
        assert_eq!(stack_ids.len(), 1, "the bridging cluster must collapse to a single stack");

        let stacks = aperture_db::AssetStack::find().all(&db).await.expect("query stacks");
        assert_eq!(stacks.len(), 1, "the merged-away stack must be deleted");
    }

    #[tokio::test]
    async fn non_overlapping_clusters_create_separate_stacks() {
        let db = test_db().await;
        let project_id = seed_project(&db).await;
        let a = seed_asset(&db, project_id, "a").await;
        let b = seed_asset(&db, project_id, "b").await;

        let created = persist_stacks(
            &db,
            project_id,
            vec![SimilarStack { asset_ids: vec![a] }, SimilarStack { asset_ids: vec![b] }],
        )
        .await
        .expect("persist");
        assert_eq!(created, 2);

        let stacks = aperture_db::AssetStack::find().all(&db).await.expect("query stacks");
        assert_eq!(stacks.len(), 2);
    }
}
