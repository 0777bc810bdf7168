//! Per-file derivation (§4.2): content hash, perceptual hash, asset/
//! instance upsert, metadata extraction, and status marking. Each file
//! is independent — one file's decoder failure never blocks another.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::error::IngestError;
use crate::exif::read_exif;
use crate::hash::{apply_exif_orientation, content_hash_file, content_hash_photo_bytes, perceptual_hash};
use crate::video::probe as probe_video;
use crate::walker::WalkedFile;

/// A file fails 3 consecutive times before it's suppressed from future
/// incremental scans until its mtime changes (§4.2).
pub const MAX_CONSECUTIVE_FAILURES: i32 = 3;

#[derive(Debug)]
pub struct DeriveOutcome {
    pub is_video: bool,
    pub skipped: bool,
    pub failed: bool,
}

pub async fn derive_file(
    db: &DatabaseConnection,
    project_id: i64,
    root: &Path,
    file: &WalkedFile,
    incremental: bool,
) -> Result<DeriveOutcome, IngestError> {
    let folder_id = ensure_folder_chain(db, root, &file.path).await?;
    let path_str = file.path.display().to_string();
    let modified: DateTime<Utc> = file.modified.into();
    let size_kb = (file.size_bytes / 1024) as i64;

    if file.is_photo {
        if let Some(existing) = aperture_db::PhotoMetadata::find()
            .filter(aperture_db::photo_metadata::Column::Path.eq(path_str.clone()))
            .filter(aperture_db::photo_metadata::Column::ProjectId.eq(project_id))
            .one(db)
            .await?
        {
            if incremental && existing.modified == modified && existing.size_kb == size_kb {
                return Ok(DeriveOutcome { is_video: false, skipped: true, failed: false });
            }
            if incremental && existing.metadata_fail_count >= MAX_CONSECUTIVE_FAILURES && existing.modified == modified {
                return Ok(DeriveOutcome { is_video: false, skipped: true, failed: false });
            }
        }
    } else if let Some(existing) = aperture_db::VideoMetadata::find()
        .filter(aperture_db::video_metadata::Column::Path.eq(path_str.clone()))
        .filter(aperture_db::video_metadata::Column::ProjectId.eq(project_id))
        .one(db)
        .await?
    {
        if incremental && existing.modified == modified && existing.size_kb == size_kb {
            return Ok(DeriveOutcome { is_video: true, skipped: true, failed: false });
        }
        if existing.metadata_fail_count >= MAX_CONSECUTIVE_FAILURES && existing.modified == modified {
            return Ok(DeriveOutcome { is_video: true, skipped: true, failed: false });
        }
    }

    let is_photo = file.is_photo;
    let path = file.path.clone();
    let computed = tokio::task::spawn_blocking(move || compute_hashes(&path, is_photo))
        .await
        .expect("blocking hash task panicked");

    match computed {
        Ok(derived) => {
            commit_derived(db, project_id, folder_id, &path_str, size_kb, modified, is_photo, &derived).await?;
            Ok(DeriveOutcome { is_video: !is_photo, skipped: false, failed: false })
        }
        Err(e) => {
            record_failure(db, project_id, folder_id, &path_str, size_kb, modified, is_photo, &e.to_string()).await?;
            Ok(DeriveOutcome { is_video: !is_photo, skipped: false, failed: true })
        }
    }
}

struct Derived {
    content_hash: String,
    perceptual_hash: i64,
    date_taken: Option<DateTime<Utc>>,
    width: Option<i32>,
    height: Option<i32>,
    duration_seconds: Option<f64>,
    codec: Option<String>,
    fps: Option<f64>,
    bitrate: Option<i64>,
}

fn compute_hashes(path: &Path, is_photo: bool) -> Result<Derived, IngestError> {
    if is_photo {
        let raw = image::open(path).map_err(|e| IngestError::Decode { path: path.display().to_string(), source: e })?;
        let exif = read_exif(path);
        let normalized = apply_exif_orientation(raw, exif.orientation);
        let content_hash = content_hash_photo_bytes(&normalized);
        let phash = perceptual_hash(&normalized) as i64;
        let (width, height) = (normalized.width() as i32, normalized.height() as i32);
        Ok(Derived {
            content_hash,
            perceptual_hash: phash,
            date_taken: exif.date_taken,
            width: Some(width),
            height: Some(height),
            duration_seconds: None,
            codec: None,
            fps: None,
            bitrate: None,
        })
    } else {
        let content_hash = content_hash_file(path)?;
        let probe = probe_video(path)?;
        // Perceptual hash for video uses the same aHash over a decoded
        // still is out of scope here; stacks simply won't cluster videos
        // together, which matches most photo-library expectations.
        Ok(Derived {
            content_hash,
            perceptual_hash: 0,
            date_taken: None,
            width: probe.width,
            height: probe.height,
            duration_seconds: probe.duration_seconds,
            codec: probe.codec,
            fps: probe.fps,
            bitrate: probe.bitrate,
        })
    }
}

#[allow(clippy::too_many_arguments)]
async fn commit_derived(
    db: &DatabaseConnection,
    project_id: i64,
    folder_id: i64,
    path_str: &str,
    size_kb: i64,
    modified: DateTime<Utc>,
    is_photo: bool,
    derived: &Derived,
) -> Result<(), IngestError> {
    let taken = derived.date_taken.unwrap_or(modified);
    let now = Utc::now();

    let photo_id = if is_photo {
        upsert_photo_row(db, project_id, folder_id, path_str, size_kb, modified, taken, derived, now).await?
    } else {
        upsert_video_row(db, project_id, folder_id, path_str, size_kb, modified, taken, derived, now).await?
    };

    let asset_id = upsert_asset(db, project_id, &derived.content_hash, derived.perceptual_hash, photo_id).await?;
    upsert_instance(db, project_id, asset_id, photo_id, path_str).await?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn upsert_photo_row(
    db: &DatabaseConnection,
    project_id: i64,
    folder_id: i64,
    path_str: &str,
    size_kb: i64,
    modified: DateTime<Utc>,
    taken: DateTime<Utc>,
    derived: &Derived,
    now: DateTime<Utc>,
) -> Result<i64, IngestError> {
    let existing = aperture_db::PhotoMetadata::find()
        .filter(aperture_db::photo_metadata::Column::Path.eq(path_str))
        .filter(aperture_db::photo_metadata::Column::ProjectId.eq(project_id))
        .one(db)
        .await?;

    let mut active: aperture_db::photo_metadata::ActiveModel = existing.map(Into::into).unwrap_or_default();
    active.path = Set(path_str.to_string());
    active.folder_id = Set(folder_id);
    active.project_id = Set(project_id);
    active.size_kb = Set(size_kb);
    active.modified = Set(modified);
    active.date_taken = Set(derived.date_taken);
    active.created_ts = Set(now);
    active.created_year = Set(taken.year());
    active.created_month = Set(taken.month() as i32);
    active.created_day = Set(taken.day() as i32);
    active.width = Set(derived.width);
    active.height = Set(derived.height);
    active.missing = Set(false);
    active.metadata_fail_count = Set(0);
    active.last_error = Set(None);
    active.faces_status = Set("pending".to_string());
    active.embed_status = Set("pending".to_string());

    let saved = active.save(db).await?;
    Ok(saved.id.unwrap())
}

#[allow(clippy::too_many_arguments)]
async fn upsert_video_row(
    db: &DatabaseConnection,
    project_id: i64,
    folder_id: i64,
    path_str: &str,
    size_kb: i64,
    modified: DateTime<Utc>,
    taken: DateTime<Utc>,
    derived: &Derived,
    now: DateTime<Utc>,
) -> Result<i64, IngestError> {
    let existing = aperture_db::VideoMetadata::find()
        .filter(aperture_db::video_metadata::Column::Path.eq(path_str))
        .filter(aperture_db::video_metadata::Column::ProjectId.eq(project_id))
        .one(db)
        .await?;

    let mut active: aperture_db::video_metadata::ActiveModel = existing.map(Into::into).unwrap_or_default();
    active.path = Set(path_str.to_string());
    active.folder_id = Set(folder_id);
    active.project_id = Set(project_id);
    active.size_kb = Set(size_kb);
    active.modified = Set(modified);
    active.date_taken = Set(derived.date_taken);
    active.created_ts = Set(now);
    active.created_year = Set(taken.year());
    active.created_month = Set(taken.month() as i32);
    active.created_day = Set(taken.day() as i32);
    active.width = Set(derived.width);
    active.height = Set(derived.height);
    active.duration_seconds = Set(derived.duration_seconds);
    active.codec = Set(derived.codec.clone());
    active.fps = Set(derived.fps);
    active.bitrate = Set(derived.bitrate);
    active.missing = Set(false);
    active.metadata_fail_count = Set(0);
    active.last_error = Set(None);
    active.faces_status = Set("pending".to_string());
    active.embed_status = Set("pending".to_string());

    let saved = active.save(db).await?;
    Ok(saved.id.unwrap())
}

async fn upsert_asset(
    db: &DatabaseConnection,
    project_id: i64,
    content_hash: &str,
    perceptual_hash: i64,
    photo_id: i64,
) -> Result<i64, IngestError> {
    if let Some(existing) = aperture_db::MediaAsset::find()
        .filter(aperture_db::media_asset::Column::ProjectId.eq(project_id))
        .filter(aperture_db::media_asset::Column::ContentHash.eq(content_hash))
        .one(db)
        .await?
    {
        return Ok(existing.asset_id);
    }

    // First writer wins `representative_photo_id` (§4.2 step 3) — a
    // concurrent insert racing this one is resolved by the unique index
    // on (project_id, content_hash) rejecting the loser, who then
    // re-reads the winner's row.
    let active = aperture_db::media_asset::ActiveModel {
        asset_id: sea_orm::ActiveValue::NotSet,
        project_id: Set(project_id),
        content_hash: Set(content_hash.to_string()),
        perceptual_hash: Set(if perceptual_hash == 0 { None } else { Some(perceptual_hash) }),
        representative_photo_id: Set(photo_id),
    };

    match active.insert(db).await {
        Ok(saved) => Ok(saved.asset_id),
        Err(_) => aperture_db::MediaAsset::find()
            .filter(aperture_db::media_asset::Column::ProjectId.eq(project_id))
            .filter(aperture_db::media_asset::Column::ContentHash.eq(content_hash))
            .one(db)
            .await?
            .map(|m| m.asset_id)
            .ok_or_else(|| IngestError::Mtp("asset race resolution failed".to_string())),
    }
}

async fn upsert_instance(
    db: &DatabaseConnection,
    project_id: i64,
    asset_id: i64,
    photo_id: i64,
    path_str: &str,
) -> Result<(), IngestError> {
    let existing = aperture_db::MediaInstance::find()
        .filter(aperture_db::media_instance::Column::ProjectId.eq(project_id))
        .filter(aperture_db::media_instance::Column::AssetId.eq(asset_id))
        .filter(aperture_db::media_instance::Column::Path.eq(path_str))
        .one(db)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let active = aperture_db::media_instance::ActiveModel {
        instance_id: sea_orm::ActiveValue::NotSet,
        project_id: Set(project_id),
        asset_id: Set(asset_id),
        photo_id: Set(photo_id),
        path: Set(path_str.to_string()),
    };
    active.insert(db).await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn record_failure(
    db: &DatabaseConnection,
    project_id: i64,
    folder_id: i64,
    path_str: &str,
    size_kb: i64,
    modified: DateTime<Utc>,
    is_photo: bool,
    error: &str,
) -> Result<(), IngestError> {
    tracing::warn!(path = path_str, error, "per-file derivation failed, isolating");

    if is_photo {
        let existing = aperture_db::PhotoMetadata::find()
            .filter(aperture_db::photo_metadata::Column::Path.eq(path_str))
            .filter(aperture_db::photo_metadata::Column::ProjectId.eq(project_id))
            .one(db)
            .await?;
        let prev_fail = existing.as_ref().map_or(0, |m| m.metadata_fail_count);
        let mut active: aperture_db::photo_metadata::ActiveModel = existing.map(Into::into).unwrap_or_default();
        active.path = Set(path_str.to_string());
        active.folder_id = Set(folder_id);
        active.project_id = Set(project_id);
        active.size_kb = Set(size_kb);
        active.modified = Set(modified);
        active.created_ts = Set(Utc::now());
        active.created_year = Set(modified.year());
        active.created_month = Set(modified.month() as i32);
        active.created_day = Set(modified.day() as i32);
        active.metadata_fail_count = Set(prev_fail + 1);
        active.last_error = Set(Some(error.to_string()));
        active.save(db).await?;
    } else {
        let existing = aperture_db::VideoMetadata::find()
            .filter(aperture_db::video_metadata::Column::Path.eq(path_str))
            .filter(aperture_db::video_metadata::Column::ProjectId.eq(project_id))
            .one(db)
            .await?;
        let prev_fail = existing.as_ref().map_or(0, |m| m.metadata_fail_count);
        let mut active: aperture_db::video_metadata::ActiveModel = existing.map(Into::into).unwrap_or_default();
        active.path = Set(path_str.to_string());
        active.folder_id = Set(folder_id);
        active.project_id = Set(project_id);
        active.size_kb = Set(size_kb);
        active.modified = Set(modified);
        active.created_ts = Set(Utc::now());
        active.created_year = Set(modified.year());
        active.created_month = Set(modified.month() as i32);
        active.created_day = Set(modified.day() as i32);
        active.metadata_fail_count = Set(prev_fail + 1);
        active.last_error = Set(Some(error.to_string()));
        active.save(db).await?;
    }

    Ok(())
}

/// Ensures every ancestor directory between `root` and the file's
/// parent exists as a `photo_folders` row, returning the immediate
/// parent's id. Folders are global (not project-scoped, §2).
async fn ensure_folder_chain(db: &DatabaseConnection, root: &Path, file_path: &Path) -> Result<i64, IngestError> {
    let root_name = root.file_name().map_or_else(|| root.display().to_string(), |n| n.to_string_lossy().to_string());
    let mut parent_id = ensure_folder(db, None, root, &root_name).await?;

    let rel = file_path.strip_prefix(root).unwrap_or(file_path);
    let Some(parent_rel) = rel.parent() else { return Ok(parent_id) };

    let mut cur: PathBuf = root.to_path_buf();
    for component in parent_rel.components() {
        cur.push(component.as_os_str());
        let name = component.as_os_str().to_string_lossy().to_string();
        parent_id = ensure_folder(db, Some(parent_id), &cur, &name).await?;
    }

    Ok(parent_id)
}

async fn ensure_folder(db: &DatabaseConnection, parent_id: Option<i64>, path: &Path, name: &str) -> Result<i64, IngestError> {
    let mut query = aperture_db::PhotoFolder::find().filter(aperture_db::photo_folder::Column::Name.eq(name));
    query = match parent_id {
        Some(id) => query.filter(aperture_db::photo_folder::Column::ParentId.eq(id)),
        None => query.filter(aperture_db::photo_folder::Column::ParentId.is_null()),
    };

    if let Some(existing) = query.one(db).await? {
        return Ok(existing.id);
    }

    let active = aperture_db::photo_folder::ActiveModel {
        id: sea_orm::ActiveValue::NotSet,
        parent_id: Set(parent_id),
        path: Set(path.display().to_string()),
        name: Set(name.to_string()),
    };
    match active.insert(db).await {
        Ok(saved) => Ok(saved.id),
        Err(_) => {
            let mut retry = aperture_db::PhotoFolder::find().filter(aperture_db::photo_folder::Column::Name.eq(name));
            retry = match parent_id {
                Some(id) => retry.filter(aperture_db::photo_folder::Column::ParentId.eq(id)),
                None => retry.filter(aperture_db::photo_folder::Column::ParentId.is_null()),
            };
            retry
                .one(db)
                .await?
                .map(|m| m.id)
                .ok_or_else(|| IngestError::Mtp("folder race resolution failed".to_string()))
        }
    }
}
