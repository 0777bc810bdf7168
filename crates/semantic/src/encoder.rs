//! CLIP-style encoder abstractions (§4.5). The engine crate supplies a
//! concrete binding (ONNX/CoreML/whatever ships the canonical model);
//! this crate only needs the worker loop to be generic over it.

use std::path::Path;

use async_trait::async_trait;

#[async_trait]
pub trait ImageEncoder: Send + Sync {
    /// The canonical model name this encoder implements — compared
    /// against `projects.semantic_model` before any work (§4.5).
    fn model_name(&self) -> &str;

    fn dim(&self) -> usize;

    async fn encode_image(&self, path: &Path) -> Result<Vec<f32>, String>;
}

#[async_trait]
pub trait TextEncoder: Send + Sync {
    fn model_name(&self) -> &str;

    async fn encode_text(&self, query: &str) -> Result<Vec<f32>, String>;
}
