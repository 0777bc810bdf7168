//! Ignore-rule engine for the ingest walker (§4.2): a fixed system
//! denylist that keeps the walker out of package and OS directories,
//! plus user-supplied accept/reject glob rules.
//!
//! Simplified from the teacher's `indexer-rules` crate: there is no
//! persisted rule catalogue or rspc-facing CRUD here, just the
//! in-memory ruler the scan job consults per path.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;

pub mod seed;

#[derive(Debug, Error)]
pub enum Error {
    #[error("glob builder error: {0}")]
    Glob(#[from] globset::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulerDecision {
    Accept,
    Reject,
}

/// A single glob-based rule, either accepting or rejecting file paths.
#[derive(Debug, Clone)]
enum RulePerKind {
    AcceptByGlob(GlobSet),
    RejectByGlob(GlobSet),
}

impl RulePerKind {
    fn build(globs: impl IntoIterator<Item = impl AsRef<str>>) -> Result<GlobSet, Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in globs {
            builder.add(Glob::new(pattern.as_ref())?);
        }
        Ok(builder.build()?)
    }

    fn accept(globs: impl IntoIterator<Item = impl AsRef<str>>) -> Result<Self, Error> {
        Ok(Self::AcceptByGlob(Self::build(globs)?))
    }

    fn reject(globs: impl IntoIterator<Item = impl AsRef<str>>) -> Result<Self, Error> {
        Ok(Self::RejectByGlob(Self::build(globs)?))
    }
}

/// Evaluates paths against the fixed system directory denylist plus a
/// caller-provided set of accept/reject glob rules.
///
/// `base` (the system denylist, shared across every scan) is reference
/// counted; `extra` (user additions for this project) is owned per
/// instance — cloning an `IndexerRuler` must never let two scans share
/// mutable extra rules.
#[derive(Debug, Clone)]
pub struct IndexerRuler {
    denylist: Arc<HashSet<String>>,
    accept: Arc<Vec<RulePerKind>>,
    extra_reject: Vec<RulePerKind>,
}

impl Default for IndexerRuler {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new()).expect("empty glob sets never fail to build")
    }
}

impl IndexerRuler {
    /// `accept_globs`: if non-empty, a path must match at least one to
    /// be accepted (an allowlist). `user_reject_globs`: additional
    /// reject patterns on top of the fixed system denylist.
    pub fn new(
        accept_globs: Vec<String>,
        user_reject_globs: Vec<String>,
    ) -> Result<Self, Error> {
        let accept = if accept_globs.is_empty() {
            Vec::new()
        } else {
            vec![RulePerKind::accept(accept_globs)?]
        };
        let extra_reject = if user_reject_globs.is_empty() {
            Vec::new()
        } else {
            vec![RulePerKind::reject(user_reject_globs)?]
        };

        Ok(Self {
            denylist: Arc::new(seed::SYSTEM_DIRECTORY_DENYLIST.iter().map(|s| (*s).to_string()).collect()),
            accept: Arc::new(accept),
            extra_reject,
        })
    }

    /// Add more reject globs for this instance only (not shared via `base`).
    pub fn extend_reject_globs(&mut self, globs: impl IntoIterator<Item = impl AsRef<str>>) -> Result<(), Error> {
        self.extra_reject.push(RulePerKind::reject(globs)?);
        Ok(())
    }

    pub fn evaluate_path(&self, path: &Path, is_dir: bool) -> RulerDecision {
        if is_dir {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if self.denylist.contains(name) {
                    tracing::trace!(path = %path.display(), "rejected by system directory denylist");
                    return RulerDecision::Reject;
                }
            }
        }

        for rule in self.extra_reject.iter().chain(self.accept.iter()) {
            match rule {
                RulePerKind::RejectByGlob(set) if set.is_match(path) => {
                    tracing::trace!(path = %path.display(), "rejected by user glob rule");
                    return RulerDecision::Reject;
                }
                RulePerKind::AcceptByGlob(set) if !set.is_match(path) => {
                    tracing::trace!(path = %path.display(), "rejected: did not match any accept glob");
                    return RulerDecision::Reject;
                }
                _ => {}
            }
        }

        RulerDecision::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_system_denylisted_directory() {
        let ruler = IndexerRuler::default();
        let decision = ruler.evaluate_path(Path::new("/home/user/photos/.git"), true);
        assert_eq!(decision, RulerDecision::Reject);
    }

    #[test]
    fn accepts_ordinary_directory() {
        let ruler = IndexerRuler::default();
        let decision = ruler.evaluate_path(Path::new("/home/user/photos/2024"), true);
        assert_eq!(decision, RulerDecision::Accept);
    }

    #[test]
    fn user_reject_glob_applies() {
        let mut ruler = IndexerRuler::default();
        ruler.extend_reject_globs(["*.tmp"]).unwrap();
        assert_eq!(
            ruler.evaluate_path(Path::new("/a/b/scratch.tmp"), false),
            RulerDecision::Reject
        );
        assert_eq!(
            ruler.evaluate_path(Path::new("/a/b/photo.jpg"), false),
            RulerDecision::Accept
        );
    }

    #[test]
    fn accept_allowlist_rejects_non_matching() {
        let ruler = IndexerRuler::new(vec!["*.jpg".to_string(), "*.png".to_string()], Vec::new()).unwrap();
        assert_eq!(
            ruler.evaluate_path(Path::new("/a/b/photo.jpg"), false),
            RulerDecision::Accept
        );
        assert_eq!(
            ruler.evaluate_path(Path::new("/a/b/notes.txt"), false),
            RulerDecision::Reject
        );
    }

    #[test]
    fn supported_media_extensions() {
        assert!(seed::is_supported_media_extension("JPG"));
        assert!(seed::is_supported_media_extension("mp4"));
        assert!(!seed::is_supported_media_extension("txt"));
        assert!(seed::is_photo_extension("heic"));
        assert!(!seed::is_photo_extension("mov"));
    }
}
