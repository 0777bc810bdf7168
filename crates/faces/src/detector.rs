//! Detector/embedder abstractions (§4.4). No bundled model ships in this
//! crate — the engine crate supplies a concrete ONNX/CoreML/whatever
//! binding. Keeping the pipeline generic over these traits is what lets
//! `faces_detect`/`faces_embed` stay restart-safe and testable without a
//! real model loaded.

use std::path::Path;

use async_trait::async_trait;

/// The detector's version string is part of the idempotence key
/// `(path, mtime, detector_version)` (§4.4) — bump it whenever the
/// model or preprocessing changes so stale crops get re-detected.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    fn version(&self) -> &str;

    async fn detect(&self, image_path: &Path) -> Result<Vec<RawDetection>, String>;
}

#[derive(Debug, Clone)]
pub struct RawDetection {
    pub confidence: f64,
    pub bbox_top: f64,
    pub bbox_right: f64,
    pub bbox_bottom: f64,
    pub bbox_left: f64,
}

/// Confidence below this is still persisted but flagged (§4.4).
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;

#[async_trait]
pub trait FaceEmbedder: Send + Sync {
    /// Fixed output dimension of [`embed`](Self::embed)'s vectors.
    fn dim(&self) -> usize;

    async fn embed(&self, image_path: &Path, bbox: (f64, f64, f64, f64)) -> Result<Vec<f32>, String>;
}
