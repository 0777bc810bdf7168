//! Content and perceptual hashing (§4.2 steps 1-2). Both are CPU-bound
//! and meant to be called from inside a `spawn_blocking`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use image::{DynamicImage, GenericImageView};

use crate::error::IngestError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Streams the file in 64 KiB chunks through blake3. Used directly for
/// videos; for photos, callers hash the EXIF-orientation-normalized
/// pixel buffer instead (see [`content_hash_photo_bytes`]) so rotated
/// duplicates of the same picture collapse to one asset.
pub fn content_hash_file(path: &Path) -> Result<String, IngestError> {
    let mut file = File::open(path).map_err(|e| IngestError::Io { path: path.display().to_string(), source: e })?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| IngestError::Io { path: path.display().to_string(), source: e })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hashes the orientation-normalized raw RGBA8 bytes of a decoded image,
/// chunked the same way as [`content_hash_file`] so the two code paths
/// stay comparable under review.
pub fn content_hash_photo_bytes(img: &DynamicImage) -> String {
    let rgba = img.to_rgba8();
    let bytes = rgba.as_raw();
    let mut hasher = blake3::Hasher::new();
    for chunk in bytes.chunks(CHUNK_SIZE) {
        hasher.update(chunk);
    }
    hasher.finalize().to_hex().to_string()
}

/// Rotates/flips `img` according to an EXIF `Orientation` tag value
/// (1-8, per the TIFF/EXIF spec), so visually-identical-but-rotated
/// photos normalize to the same pixel buffer before hashing.
pub fn apply_exif_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// 64-bit average-hash (aHash family) perceptual fingerprint: shrink to
/// an 8x8 grayscale grid, threshold each pixel against the grid mean.
/// Hamming distance between two hashes approximates visual similarity
/// (§4.3's stacking threshold is 8/64 bits).
pub fn perceptual_hash(img: &DynamicImage) -> u64 {
    let small = img.resize_exact(8, 8, image::imageops::FilterType::Triangle).to_luma8();
    let pixels: Vec<u32> = small.pixels().map(|p| p.0[0] as u32).collect();
    let mean = pixels.iter().sum::<u32>() / pixels.len() as u32;

    pixels.iter().enumerate().fold(0u64, |acc, (i, &p)| if p >= mean { acc | (1 << i) } else { acc })
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_images_have_zero_hamming_distance() {
        let img = DynamicImage::new_rgb8(64, 64);
        let a = perceptual_hash(&img);
        let b = perceptual_hash(&img);
        assert_eq!(hamming_distance(a, b), 0);
    }

    #[test]
    fn orientation_1_is_identity() {
        let img = DynamicImage::new_rgb8(4, 4);
        let bytes_before = img.to_rgba8().into_raw();
        let normalized = apply_exif_orientation(img, 1);
        assert_eq!(normalized.to_rgba8().into_raw(), bytes_before);
    }
}
