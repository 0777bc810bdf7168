//! The closed set of job kinds (§4.2-4.6) and their concurrency policy.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Scan,
    FacesDetect,
    FacesEmbed,
    FacesCluster,
    SemanticEmbed,
    DuplicateHash,
    DuplicateGroup,
    GroupIndex,
    MtpCopy,
}

impl JobKind {
    pub const ALL: [JobKind; 9] = [
        JobKind::Scan,
        JobKind::FacesDetect,
        JobKind::FacesEmbed,
        JobKind::FacesCluster,
        JobKind::SemanticEmbed,
        JobKind::DuplicateHash,
        JobKind::DuplicateGroup,
        JobKind::GroupIndex,
        JobKind::MtpCopy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Scan => "scan",
            JobKind::FacesDetect => "faces_detect",
            JobKind::FacesEmbed => "faces_embed",
            JobKind::FacesCluster => "faces_cluster",
            JobKind::SemanticEmbed => "semantic_embed",
            JobKind::DuplicateHash => "duplicate_hash",
            JobKind::DuplicateGroup => "duplicate_group",
            JobKind::GroupIndex => "group_index",
            JobKind::MtpCopy => "mtp_copy",
        }
    }

    /// Per-kind concurrency cap (§4.7): CPU-heavy stages default to 1 to
    /// avoid priority inversion against the global cap; IO-bound stages
    /// may run several at once.
    pub fn default_concurrency(self) -> usize {
        match self {
            JobKind::FacesDetect | JobKind::FacesEmbed | JobKind::FacesCluster | JobKind::SemanticEmbed => 1,
            JobKind::Scan | JobKind::DuplicateHash | JobKind::DuplicateGroup | JobKind::GroupIndex => 2,
            JobKind::MtpCopy => 1,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown job kind: {0}")]
pub struct ParseJobKindError(String);

impl FromStr for JobKind {
    type Err = ParseJobKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseJobKindError(s.to_string()))
    }
}
