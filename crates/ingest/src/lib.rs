//! Media ingest (§4.2): directory and MTP-device scanning, per-file
//! content/perceptual hashing, and EXIF/video metadata extraction.

pub mod derive;
pub mod error;
pub mod exif;
pub mod hash;
pub mod mtp;
pub mod scan;
pub mod video;
pub mod walker;

pub use derive::{derive_file, DeriveOutcome};
pub use error::IngestError;
pub use mtp::{MtpCopyConfig, MtpCopyHandle, MtpCopyRunner, MtpSource, MTP_COPY_TIMEOUT};
pub use scan::{ScanConfig, ScanRunner};
pub use walker::{walk, WalkedFile};
