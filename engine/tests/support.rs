//! Minimal stub bindings so [`aperture_engine::Engine::start`] can be
//! exercised without a real detector/encoder/device attached.

use std::path::Path;
use std::sync::Arc;

use aperture_engine::EngineBindings;
use aperture_faces::{FaceDetector, FaceEmbedder, RawDetection};
use aperture_ingest::{MtpCopyHandle, MtpSource};
use aperture_semantic::{ImageEncoder, TextEncoder};
use async_trait::async_trait;

pub struct NoopFaceDetector;

#[async_trait]
impl FaceDetector for NoopFaceDetector {
    fn version(&self) -> &str {
        "noop-v1"
    }

    async fn detect(&self, _image_path: &Path) -> Result<Vec<RawDetection>, String> {
        Ok(Vec::new())
    }
}

pub struct NoopFaceEmbedder;

#[async_trait]
impl FaceEmbedder for NoopFaceEmbedder {
    fn dim(&self) -> usize {
        128
    }

    async fn embed(&self, _image_path: &Path, _bbox: (f64, f64, f64, f64)) -> Result<Vec<f32>, String> {
        Ok(vec![0.0; 128])
    }
}

pub struct StubImageEncoder {
    pub model: &'static str,
}

#[async_trait]
impl ImageEncoder for StubImageEncoder {
    fn model_name(&self) -> &str {
        self.model
    }

    fn dim(&self) -> usize {
        3
    }

    async fn encode_image(&self, _path: &Path) -> Result<Vec<f32>, String> {
        Ok(vec![1.0, 0.0, 0.0])
    }
}

pub struct StubTextEncoder {
    pub model: &'static str,
}

#[async_trait]
impl TextEncoder for StubTextEncoder {
    fn model_name(&self) -> &str {
        self.model
    }

    async fn encode_text(&self, _query: &str) -> Result<Vec<f32>, String> {
        Ok(vec![1.0, 0.0, 0.0])
    }
}

pub struct NoopMtpSource;

#[async_trait]
impl MtpSource for NoopMtpSource {
    async fn list_files(&self) -> Result<Vec<String>, String> {
        Ok(Vec::new())
    }

    async fn begin_copy(&self, _device_path: &str, _dest: &Path) -> Result<Box<dyn MtpCopyHandle>, String> {
        Err("no device attached in tests".to_string())
    }
}

pub fn bindings() -> EngineBindings {
    EngineBindings {
        face_detector: Arc::new(NoopFaceDetector),
        face_embedder: Arc::new(NoopFaceEmbedder),
        image_encoder: Arc::new(StubImageEncoder { model: "clip-vit-b32" }),
        text_encoder: Arc::new(StubTextEncoder { model: "clip-vit-b32" }),
        mtp_source: Arc::new(NoopMtpSource),
    }
}

pub fn test_config() -> (aperture_engine::EngineConfig, tempfile::TempDir, tempfile::TempDir) {
    let store_dir = tempfile::tempdir().expect("store tempdir");
    let scratch_dir = tempfile::tempdir().expect("scratch tempdir");
    let config = aperture_engine::EngineConfig {
        store_path: store_dir.path().join("aperture.db"),
        scratch_dir: scratch_dir.path().to_path_buf(),
        global_concurrency: Some(2),
        default_face_eps: 0.4,
        default_face_min_samples: 2,
        default_semantic_model: "clip-vit-b32".to_string(),
    };
    (config, store_dir, scratch_dir)
}
