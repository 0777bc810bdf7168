//! Duplicate and similar-photo stacking (§4.3).

pub mod error;
pub mod exact;
pub mod group;
pub mod hash_backfill;
pub mod similar;
pub mod stacks;

pub use error::DedupError;
pub use exact::{exact_duplicate_groups, ExactDuplicateGroup};
pub use group::DuplicateGroupRunner;
pub use hash_backfill::DuplicateHashRunner;
pub use similar::{cluster_similar_assets, similarity_score, SimilarStack, SIMILARITY_THRESHOLD};
pub use stacks::{persist_stacks, set_representative, unstack};

#[cfg(test)]
mod tests {
    use super::similar::similarity_score;

    #[test]
    fn identical_hashes_score_one() {
        assert!((similarity_score(0xABCD, 0xABCD) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn maximal_hamming_distance_scores_zero() {
        assert!((similarity_score(0u64, u64::MAX) - 0.0).abs() < f64::EPSILON);
    }
}
