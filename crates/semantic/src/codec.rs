//! Packed storage format (§4.5): `dim < 0` marks a float16 blob (logical
//! dimension `-dim`), `dim > 0` marks float32. Readers always get back
//! an L2-normalized `Vec<f32>`; normalization happens once at store time
//! so reads stay zero-cost.

use half::f16;

use crate::error::SemanticError;

pub fn l2_normalize(v: &mut [f32]) {
    let magnitude = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 1e-6 {
        for x in v.iter_mut() {
            *x /= magnitude;
        }
    }
}

/// Encodes an already-normalized vector as float16, returning
/// `(blob, dim)` with `dim` negative per the storage convention.
pub fn encode_f16(vector: &[f32]) -> (Vec<u8>, i32) {
    let mut bytes = Vec::with_capacity(vector.len() * 2);
    for v in vector {
        bytes.extend_from_slice(&f16::from_f32(*v).to_le_bytes());
    }
    (bytes, -(vector.len() as i32))
}

pub fn encode_f32(vector: &[f32]) -> (Vec<u8>, i32) {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    (bytes, vector.len() as i32)
}

/// Decodes a packed embedding blob, rejecting a length that doesn't
/// match what `dim` implies (§6: a corrupt/truncated row is a
/// recoverable error — marked corrupt, excluded from search, logged —
/// never silently mis-decoded).
pub fn decode(blob: &[u8], dim: i32) -> Result<Vec<f32>, SemanticError> {
    let (elem_size, count) = if dim < 0 { (2usize, (-dim) as usize) } else { (4usize, dim as usize) };
    let expected_len = elem_size * count;
    if blob.len() != expected_len {
        return Err(SemanticError::CorruptEmbedding { dim, expected_len, actual_len: blob.len() });
    }

    Ok(if dim < 0 {
        blob.chunks_exact(2).map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32()).collect()
    } else {
        blob.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
    })
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_round_trips_exactly() {
        let v = vec![0.25f32, -0.5, 0.75];
        let (blob, dim) = encode_f32(&v);
        assert_eq!(dim, 3);
        assert_eq!(decode(&blob, dim).unwrap(), v);
    }

    #[test]
    fn f16_round_trips_within_tolerance() {
        let mut v = vec![1.0f32, 2.0, 3.0];
        l2_normalize(&mut v);
        let (blob, dim) = encode_f16(&v);
        assert_eq!(dim, -3);
        let back = decode(&blob, dim).unwrap();
        for (a, b) in v.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn truncated_blob_is_rejected_as_corrupt() {
        let v = vec![0.25f32, -0.5, 0.75];
        let (mut blob, dim) = encode_f32(&v);
        blob.truncate(blob.len() - 1);
        assert!(matches!(decode(&blob, dim), Err(SemanticError::CorruptEmbedding { .. })));
    }
}
