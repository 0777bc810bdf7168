//! The fixed, built-in directory denylist (§4.2): system and package
//! directories the walker must never descend into, regardless of what
//! the user configures. Matched against the directory's own name, not
//! its full path, so the same rule fires at any depth in the tree.

pub const SYSTEM_DIRECTORY_DENYLIST: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    // OS / filesystem
    "System Volume Information",
    "$RECYCLE.BIN",
    ".Trash",
    ".Trashes",
    ".fseventsd",
    ".Spotlight-V100",
    "lost+found",
    // package manager / build caches that sometimes hide nested media fixtures
    "node_modules",
    "__pycache__",
    ".cache",
    // this engine's own on-disk cache, never itself a source of media
    ".crops",
];

/// Supported media suffixes (§4.2), matched case-insensitively.
pub const PHOTO_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "heic", "heif", "webp", "tiff"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];

pub fn is_supported_media_extension(ext: &str) -> bool {
    let lower = ext.to_ascii_lowercase();
    PHOTO_EXTENSIONS.contains(&lower.as_str()) || VIDEO_EXTENSIONS.contains(&lower.as_str())
}

pub fn is_photo_extension(ext: &str) -> bool {
    PHOTO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}
