//! Similar-photo (stack) clustering (§4.3): union-find over perceptual
//! hashes, bucketed by their top 16 bits so the comparison set per
//! asset stays small without needing an external ANN index.

use std::collections::HashMap;

use aperture_ingest::hash::hamming_distance;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::error::DedupError;

/// Hamming-distance threshold for "same stack" (§4.3: 8 out of 64 bits).
pub const SIMILARITY_THRESHOLD: u32 = 8;

#[derive(Debug, Clone)]
pub struct SimilarStack {
    pub asset_ids: Vec<i64>,
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

/// Clusters every asset with a non-null perceptual hash into stacks of
/// 2+ members (§4.3: singleton stacks are not persisted).
pub async fn cluster_similar_assets(db: &DatabaseConnection, project_id: i64) -> Result<Vec<SimilarStack>, DedupError> {
    let assets = aperture_db::MediaAsset::find()
        .filter(aperture_db::media_asset::Column::ProjectId.eq(project_id))
        .filter(aperture_db::media_asset::Column::PerceptualHash.is_not_null())
        .all(db)
        .await?;

    let hashes: Vec<(i64, u64)> = assets.iter().map(|a| (a.asset_id, a.perceptual_hash.unwrap() as u64)).collect();

    // Bucket by the top 16 bits; candidates for a merge are either in
    // the same bucket or a bucket one bit-flip away (a hash near a
    // bucket boundary can still be within threshold of a neighbor).
    let mut buckets: HashMap<u16, Vec<usize>> = HashMap::new();
    for (i, (_, hash)) in hashes.iter().enumerate() {
        let prefix = (*hash >> 48) as u16;
        buckets.entry(prefix).or_default().push(i);
    }

    let mut dsu = DisjointSet::new(hashes.len());

    for (i, (_, hash_i)) in hashes.iter().enumerate() {
        let prefix = (*hash_i >> 48) as u16;
        let mut candidate_buckets = vec![prefix];
        for bit in 0..16 {
            candidate_buckets.push(prefix ^ (1 << bit));
        }

        for bucket_key in candidate_buckets {
            let Some(members) = buckets.get(&bucket_key) else { continue };
            for &j in members {
                if j <= i {
                    continue;
                }
                let (_, hash_j) = hashes[j];
                if hamming_distance(*hash_i, hash_j) <= SIMILARITY_THRESHOLD {
                    dsu.union(i, j);
                }
            }
        }
    }

    let mut components: HashMap<usize, Vec<i64>> = HashMap::new();
    for (i, (asset_id, _)) in hashes.iter().enumerate() {
        let root = dsu.find(i);
        components.entry(root).or_default().push(*asset_id);
    }

    Ok(components.into_values().filter(|members| members.len() >= 2).map(|asset_ids| SimilarStack { asset_ids }).collect())
}

/// 1 − normalized Hamming distance, the per-pair similarity score
/// exposed alongside a stack (§4.3).
pub fn similarity_score(a: u64, b: u64) -> f64 {
    1.0 - (hamming_distance(a, b) as f64 / 64.0)
}
