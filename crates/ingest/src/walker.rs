//! Directory walker (§4.2): descends `root`, pruning anything the
//! [`IndexerRuler`] rejects, and yields only files with a supported
//! media extension.

use std::path::PathBuf;

use aperture_indexer_rules::{seed, IndexerRuler, RulerDecision};
use walkdir::WalkDir;

pub struct WalkedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: std::time::SystemTime,
    pub is_photo: bool,
}

pub fn walk(root: &std::path::Path, ruler: &IndexerRuler) -> Vec<WalkedFile> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            ruler.evaluate_path(entry.path(), entry.file_type().is_dir()) == RulerDecision::Accept
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let ext = entry.path().extension()?.to_str()?.to_string();
            if !seed::is_supported_media_extension(&ext) {
                return None;
            }
            let meta = entry.metadata().ok()?;
            Some(WalkedFile {
                path: entry.into_path(),
                size_bytes: meta.len(),
                modified: meta.modified().ok()?,
                is_photo: seed::is_photo_extension(&ext),
            })
        })
        .collect()
}
