//! Semantic embedding index (§4.5): CLIP-style image/text embeddings
//! under a single canonical model per project, with a migration path
//! that keeps old vectors around for rollback instead of deleting them.

mod codec;
mod encoder;
mod error;
mod migration;
mod readiness;
#[cfg(test)]
mod test_support;
mod worker;

pub use codec::{cosine_similarity, decode, encode_f16, encode_f32, l2_normalize};
pub use encoder::{ImageEncoder, TextEncoder};
pub use error::SemanticError;
pub use migration::{reindex_set, set_canonical_model};
pub use readiness::check_readiness;
pub use worker::{SemanticEmbedConfig, SemanticEmbedRunner, DEFAULT_CHECKPOINT_INTERVAL};
