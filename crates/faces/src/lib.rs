//! Face detection, embedding, and clustering (§4.4).

pub mod cluster_job;
pub mod codec;
pub mod dbscan;
pub mod detect;
pub mod detector;
pub mod embed;
pub mod error;
pub mod group;
pub mod group_index;
pub mod maintenance;

pub use cluster_job::FacesClusterRunner;
pub use detect::{DetectScope, FacesDetectConfig, FacesDetectRunner};
pub use detector::{FaceDetector, FaceEmbedder, RawDetection, LOW_CONFIDENCE_THRESHOLD};
pub use embed::FacesEmbedRunner;
pub use error::FacesError;
pub use group::{add_member, create_group, remove_member};
pub use group_index::{GroupIndexConfig, GroupIndexRunner};
pub use maintenance::{audit_and_repair, AuditReport};
