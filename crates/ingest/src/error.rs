#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("io error on {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("failed to decode image at {path}: {source}")]
    Decode { path: String, #[source] source: image::ImageError },

    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error(transparent)]
    JobSystem(#[from] aperture_job_system::JobSystemError),

    #[error("mtp copy of {path} timed out after {timeout_secs}s")]
    MtpCopyTimeout { path: String, timeout_secs: u64 },

    #[error("mtp source error: {0}")]
    Mtp(String),

    #[error("failed to probe video at {path}: {source}")]
    VideoProbe { path: String, #[source] source: ffmpeg_next::Error },
}
