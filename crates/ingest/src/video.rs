//! Video metadata extraction (§4.2 step 5) via `ffmpeg-next`'s demuxer
//! probe. Opens the container, reads the best video stream's codec,
//! frame rate and duration without decoding any frames.

use std::path::Path;

use crate::error::IngestError;

#[derive(Debug, Clone, Default)]
pub struct VideoProbe {
    pub duration_seconds: Option<f64>,
    pub codec: Option<String>,
    pub fps: Option<f64>,
    pub bitrate: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// A failed probe is a real derivation failure (§4.2), not a file stored
/// with partial metadata — the caller records it via `record_failure`
/// and retries on the next incremental scan.
pub fn probe(path: &Path) -> Result<VideoProbe, IngestError> {
    probe_inner(path).map_err(|e| IngestError::VideoProbe { path: path.display().to_string(), source: e })
}

fn probe_inner(path: &Path) -> Result<VideoProbe, ffmpeg_next::Error> {
    ffmpeg_next::init()?;
    let ictx = ffmpeg_next::format::input(path)?;

    let duration_seconds = if ictx.duration() > 0 {
        Some(ictx.duration() as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE))
    } else {
        None
    };
    let bitrate = if ictx.bit_rate() > 0 { Some(ictx.bit_rate() as i64) } else { None };

    let stream = ictx.streams().best(ffmpeg_next::media::Type::Video);
    let (codec, fps, width, height) = match stream {
        Some(s) => {
            let params = s.parameters();
            let codec_name = ffmpeg_next::codec::context::Context::from_parameters(params.clone())
                .ok()
                .map(|ctx| ctx.id())
                .map(|id| format!("{id:?}").to_lowercase());
            let rate = s.avg_frame_rate();
            let fps = if rate.denominator() != 0 { Some(f64::from(rate.numerator()) / f64::from(rate.denominator())) } else { None };
            let decoder = ffmpeg_next::codec::context::Context::from_parameters(params).ok().and_then(|ctx| ctx.decoder().video().ok());
            let (w, h) = decoder.map(|d| (d.width() as i32, d.height() as i32)).unwrap_or((0, 0));
            (codec_name, fps, Some(w), Some(h))
        }
        None => (None, None, None, None),
    };

    Ok(VideoProbe { duration_seconds, codec, fps, bitrate, width, height })
}
