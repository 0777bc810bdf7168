//! `faces_cluster` job runner (§4.4): DBSCAN over every crop's
//! embedding, honoring pre-existing `manual_*` branches as must-link
//! constraints, then persisting branch assignments and representative
//! crops. Either completes over every eligible crop or not at all —
//! partial cluster assignments are forbidden (§7).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use aperture_job_system::{JobHandle, JobKind, JobOutcome, JobRunner, JobSystemError};
use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::codec::{cosine_similarity, decode, l2_normalize};
use crate::dbscan;

const MANUAL_PREFIX: &str = "manual_";
const AUTO_PREFIX: &str = "face_";

pub struct FacesClusterRunner {
    db: DatabaseConnection,
}

impl FacesClusterRunner {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }
    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

#[async_trait]
impl JobRunner for FacesClusterRunner {
    fn kind(&self) -> JobKind {
        JobKind::FacesCluster
    }

    async fn run(&self, handle: Arc<JobHandle>) -> Result<JobOutcome, JobSystemError> {
        let project = aperture_db::Project::find_by_id(handle.project_id)
            .one(&self.db)
            .await?
            .ok_or(JobSystemError::NotFound(handle.job_id))?;

        handle.checkpoint(0, 3, "loading face embeddings".to_string()).await?;
        let crops = aperture_db::FaceCrop::find()
            .filter(aperture_db::face_crop::Column::ProjectId.eq(handle.project_id))
            .filter(aperture_db::face_crop::Column::Embedding.is_not_null())
            .all(&self.db)
            .await?;

        if crops.is_empty() {
            return Ok(JobOutcome::Completed(serde_json::json!({ "detected": 0, "clustered": 0 })));
        }

        let points: Vec<Vec<f32>> = crops
            .iter()
            .map(|c| {
                let mut v = decode(c.embedding.as_deref().unwrap_or_default());
                l2_normalize(&mut v);
                v
            })
            .collect();

        handle.checkpoint(1, 3, "running dbscan".to_string()).await?;
        let dbscan_labels = dbscan::cluster(&points, project.face_eps, project.face_min_samples.max(1) as usize);

        // Must-link: union every pair of crops that already share a
        // manual_* branch_key, plus whatever DBSCAN cluster each falls
        // into, so a manually-labeled person absorbs nearby automatic
        // detections instead of being split by them.
        let mut dsu = DisjointSet::new(crops.len());
        let mut manual_label_of: HashMap<usize, String> = HashMap::new();
        for (i, crop) in crops.iter().enumerate() {
            if let Some(key) = &crop.branch_key {
                if key.starts_with(MANUAL_PREFIX) {
                    manual_label_of.insert(i, key.clone());
                }
            }
        }
        for (&i, label) in &manual_label_of {
            for (&j, other_label) in &manual_label_of {
                if i != j && label == other_label {
                    dsu.union(i, j);
                }
            }
        }
        let mut dbscan_members: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, label) in dbscan_labels.iter().enumerate() {
            if let Some(l) = label {
                dbscan_members.entry(*l).or_default().push(i);
            }
        }
        for members in dbscan_members.values() {
            for pair in members.windows(2) {
                dsu.union(pair[0], pair[1]);
            }
        }

        let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
        for i in 0..crops.len() {
            // Noise points that never joined a manual group stay singleton.
            if dbscan_labels[i].is_none() && !manual_label_of.contains_key(&i) {
                continue;
            }
            let root = dsu.find(i);
            components.entry(root).or_default().push(i);
        }

        let existing_reps = aperture_db::FaceBranchRep::find()
            .filter(aperture_db::face_branch_rep::Column::ProjectId.eq(handle.project_id))
            .all(&self.db)
            .await?;
        let mut next_auto = existing_reps
            .iter()
            .filter_map(|r| r.branch_key.strip_prefix(AUTO_PREFIX))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .map_or(0, |m| m + 1);

        let mut assignments: HashMap<i64, String> = HashMap::new();
        let mut branch_members: HashMap<String, Vec<usize>> = HashMap::new();

        for indices in components.into_values() {
            let manual_keys: HashSet<&String> = indices.iter().filter_map(|i| manual_label_of.get(i)).collect();
            let branch_key = if let Some(key) = manual_keys.into_iter().min() {
                key.clone()
            } else {
                let key = format!("{AUTO_PREFIX}{next_auto:03}");
                next_auto += 1;
                key
            };
            for &i in &indices {
                assignments.insert(crops[i].id, branch_key.clone());
            }
            branch_members.insert(branch_key, indices);
        }

        handle.checkpoint(2, 3, "persisting branches".to_string()).await?;
        let txn = aperture_db::begin_immediate(&self.db).await?;

        for crop in &crops {
            let new_key = assignments.get(&crop.id).cloned();
            if new_key != crop.branch_key {
                let mut active: aperture_db::face_crop::ActiveModel = crop.clone().into();
                active.branch_key = Set(new_key);
                active.is_representative = Set(false);
                active.update(&txn).await?;
            }
        }

        let new_branch_keys: HashSet<&String> = branch_members.keys().collect();
        for rep in &existing_reps {
            if !new_branch_keys.contains(&rep.branch_key) {
                mark_groups_stale(&txn, handle.project_id, &rep.branch_key).await?;
                aperture_db::FaceBranchRep::delete_by_id((rep.project_id, rep.branch_key.clone())).exec(&txn).await?;
            }
        }

        for (branch_key, indices) in &branch_members {
            for &i in indices {
                if crops[i].is_representative {
                    let mut active: aperture_db::face_crop::ActiveModel = crops[i].clone().into();
                    active.is_representative = Set(false);
                    active.update(&txn).await?;
                }
            }

            let rep_index = *indices
                .iter()
                .max_by(|&&a, &&b| {
                    let area_a = area(&crops[a]) * crops[a].confidence;
                    let area_b = area(&crops[b]) * crops[b].confidence;
                    area_a.partial_cmp(&area_b).unwrap_or(std::cmp::Ordering::Equal).then(crops[b].id.cmp(&crops[a].id))
                })
                .unwrap();
            let intra = mean_intra_cluster_similarity(indices, &points);
            let inter = branch_members
                .iter()
                .filter(|(other_key, _)| *other_key != branch_key)
                .map(|(_, other_indices)| mean_inter_cluster_similarity(indices, other_indices, &points))
                .fold(0.0f64, f64::max);
            let quality_score = intra - inter;

            let existing = existing_reps.iter().find(|r| &r.branch_key == branch_key);
            let label = existing.and_then(|r| r.label.clone());

            let active = aperture_db::face_branch_rep::ActiveModel {
                project_id: Set(handle.project_id),
                branch_key: Set(branch_key.clone()),
                label: Set(label),
                count: Set(indices.len() as i32),
                rep_path: Set(Some(crops[rep_index].image_path.clone())),
                rep_thumb_png: Set(existing.and_then(|r| r.rep_thumb_png.clone())),
                quality_score: Set(quality_score),
            };
            aperture_db::FaceBranchRep::insert(active)
                .on_conflict(
                    sea_orm::sea_query::OnConflict::columns([
                        aperture_db::face_branch_rep::Column::ProjectId,
                        aperture_db::face_branch_rep::Column::BranchKey,
                    ])
                    .update_columns([
                        aperture_db::face_branch_rep::Column::Count,
                        aperture_db::face_branch_rep::Column::RepPath,
                        aperture_db::face_branch_rep::Column::QualityScore,
                    ])
                    .to_owned(),
                )
                .exec(&txn)
                .await?;

            let mut rep_active: aperture_db::face_crop::ActiveModel = crops[rep_index].clone().into();
            rep_active.is_representative = Set(true);
            rep_active.update(&txn).await?;
        }

        txn.commit().await?;

        Ok(JobOutcome::Completed(serde_json::json!({
            "detected": crops.len() as u64,
            "clustered": branch_members.len() as u64,
        })))
    }
}

fn area(crop: &aperture_db::face_crop::Model) -> f64 {
    (crop.bbox_right - crop.bbox_left).abs() * (crop.bbox_bottom - crop.bbox_top).abs()
}

fn mean_intra_cluster_similarity(indices: &[usize], points: &[Vec<f32>]) -> f64 {
    if indices.len() < 2 {
        return 1.0;
    }
    let mut sum = 0.0f64;
    let mut count = 0u64;
    for (a, &i) in indices.iter().enumerate() {
        for &j in &indices[a + 1..] {
            sum += cosine_similarity(&points[i], &points[j]) as f64;
            count += 1;
        }
    }
    if count == 0 {
        1.0
    } else {
        sum / count as f64
    }
}

/// Mean pairwise cosine similarity between two clusters' points — the
/// "overlap" a branch's quality score is penalized by (§4.4: quality is
/// mean intra-cluster similarity minus the worst overlap with any other
/// branch, so a cluster that sits right next to another in embedding
/// space scores lower even if it's internally tight).
fn mean_inter_cluster_similarity(a: &[usize], b: &[usize], points: &[Vec<f32>]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut sum = 0.0f64;
    let mut count = 0u64;
    for &i in a {
        for &j in b {
            sum += cosine_similarity(&points[i], &points[j]) as f64;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

async fn mark_groups_stale(db: &impl sea_orm::ConnectionTrait, project_id: i64, branch_key: &str) -> Result<(), sea_orm::DbErr> {
    let members = aperture_db::PersonGroupMember::find()
        .filter(aperture_db::person_group_member::Column::BranchKey.eq(branch_key))
        .all(db)
        .await?;

    for member in members {
        if let Some(group) = aperture_db::PersonGroup::find_by_id(member.group_id).one(db).await? {
            if group.project_id == project_id && !group.stale {
                let mut active: aperture_db::person_group::ActiveModel = group.into();
                active.stale = Set(true);
                active.update(db).await?;
            }
        }
    }
    Ok(())
}
