//! Entity definitions and connection policy for the single embedded SQL
//! store. No migration logic lives here — see `aperture-migration`.

pub mod connection;
pub mod entities;

pub use connection::{begin_immediate, checkpoint_full, connect, foreign_keys_enabled, BUSY_TIMEOUT};
pub use entities::prelude::*;
pub use entities::{
    asset_stack, asset_stack_member, face_branch_rep, face_crop, global_setting, maintenance_audit, media_asset,
    media_instance, ml_job, person_group, person_group_match_cache, person_group_member, photo_folder, photo_metadata,
    photo_tag, project, schema_version, semantic_embedding, tag, video_metadata,
};
