//! `EngineConfig` (expansion): the store path, scratch dir, and
//! concurrency/clustering defaults, loaded from TOML. Grounded on the
//! teacher's `sd-config` crate role — a small, flat settings struct
//! with a `load`/`save` pair rather than a general config framework.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the embedded SQLite store file.
    pub store_path: PathBuf,
    /// Scratch directory for MTP copy staging and other temp work.
    pub scratch_dir: PathBuf,
    /// Global job concurrency cap; `None` defaults to CPU count (§4.7).
    #[serde(default)]
    pub global_concurrency: Option<usize>,
    /// Default DBSCAN `eps` applied to new projects (§9 resolved open question).
    #[serde(default = "default_face_eps")]
    pub default_face_eps: f64,
    /// Default DBSCAN `min_samples` applied to new projects.
    #[serde(default = "default_face_min_samples")]
    pub default_face_min_samples: i32,
    /// Canonical semantic model name applied to new projects.
    #[serde(default = "default_semantic_model")]
    pub default_semantic_model: String,
}

fn default_face_eps() -> f64 {
    0.4
}

fn default_face_min_samples() -> i32 {
    2
}

fn default_semantic_model() -> String {
    "clip-vit-b32".to_string()
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&text)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }
}
