//! Raw little-endian float32 encoding shared by the SQLite blob column and
//! the RediSearch `PARAMS` vector buffer.

pub fn encode(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn decode(bytes: &[u8]) -> Result<Vec<f32>, String> {
    if bytes.len() % 4 != 0 {
        return Err(format!(
            "Vector blob length {} is not a multiple of 4",
            bytes.len()
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Rejects any vector whose length differs from the configured dimension.
pub fn check_dimension(v: &[f32], expected: usize) -> Result<(), String> {
    if v.len() != expected {
        return Err(format!(
            "Vector dimension mismatch: expected {expected}, got {}",
            v.len()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_little_endian() {
        assert_eq!(encode(&[1.0]), vec![0x00, 0x00, 0x80, 0x3f]);
    }

    #[test]
    fn test_decode_preserves_bits() {
        let v = vec![f32::MIN_POSITIVE, -0.0, 1.5e-7, f32::MAX];
        let back = decode(&encode(&v)).unwrap();
        for (a, b) in v.iter().zip(back.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_truncated_blob_is_rejected() {
        assert!(decode(&[0, 0, 128]).is_err());
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(&[0.0; 4], 4).is_ok());
        assert!(check_dimension(&[0.0; 3], 4).is_err());
        assert!(check_dimension(&[], 4).is_err());
    }
}
