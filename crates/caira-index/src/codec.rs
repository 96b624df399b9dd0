//! Binary container for the flat vector index.
//!
//! Layout, little-endian:
//!
//! | field    | type                          |
//! |----------|-------------------------------|
//! | magic    | `b"CAIRAIDX"`                 |
//! | version  | `u32`                         |
//! | dim      | `u32`                         |
//! | count    | `u64`                         |
//! | payload  | `count * dim` x `f32`         |
//! | checksum | SHA-256 of all bytes before it|

use caira_core::CairaError;
use sha2::{Digest, Sha256};

/// File signature.
pub const MAGIC: &[u8; 8] = b"CAIRAIDX";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 8 + 4 + 4 + 8;
const CHECKSUM_LEN: usize = 32;

/// Vectors decoded from an index file.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedIndex {
    /// Dimension of every vector.
    pub dimension: usize,
    /// Number of vectors.
    pub count: usize,
    /// `count * dimension` values, row-major.
    pub vectors: Vec<f32>,
}

/// Serialize a row-major vector matrix.
///
/// # Errors
///
/// Returns [`CairaError::InvalidInput`] if `vectors.len()` is not a multiple
/// of `dimension` or the dimension does not fit the header.
///
/// # Examples
///
/// ```
/// use caira_index::codec::{decode, encode};
///
/// let bytes = encode(2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
/// let decoded = decode(&bytes).unwrap();
/// assert_eq!(decoded.count, 2);
/// assert_eq!(decoded.vectors, vec![1.0, 2.0, 3.0, 4.0]);
/// ```
pub fn encode(dimension: usize, vectors: &[f32]) -> Result<Vec<u8>, CairaError> {
    if dimension == 0 || vectors.len() % dimension != 0 {
        return Err(CairaError::InvalidInput(format!(
            "{} values do not form vectors of dimension {dimension}",
            vectors.len()
        )));
    }
    let dim = u32::try_from(dimension)
        .map_err(|_| CairaError::InvalidInput(format!("dimension {dimension} too large")))?;
    let count = (vectors.len() / dimension) as u64;

    let mut bytes = Vec::with_capacity(HEADER_LEN + vectors.len() * 4 + CHECKSUM_LEN);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&dim.to_le_bytes());
    bytes.extend_from_slice(&count.to_le_bytes());
    bytes.extend_from_slice(&floats_to_bytes(vectors));

    let checksum = Sha256::digest(&bytes);
    bytes.extend_from_slice(&checksum);
    Ok(bytes)
}

/// Parse and verify an index file.
///
/// # Errors
///
/// Returns [`CairaError::CorruptIndex`] on a bad signature, unsupported
/// version, zero dimension, truncated or oversized payload, or checksum
/// mismatch.
pub fn decode(bytes: &[u8]) -> Result<DecodedIndex, CairaError> {
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(CairaError::CorruptIndex(format!(
            "file is {} bytes, too short for an index",
            bytes.len()
        )));
    }
    if &bytes[..8] != MAGIC {
        return Err(CairaError::CorruptIndex("bad file signature".into()));
    }

    let version = read_u32(&bytes[8..12]);
    if version != FORMAT_VERSION {
        return Err(CairaError::CorruptIndex(format!(
            "unsupported format version {version}"
        )));
    }

    let (body, stored_checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    if Sha256::digest(body).as_slice() != stored_checksum {
        return Err(CairaError::CorruptIndex("checksum mismatch".into()));
    }

    let dimension = read_u32(&bytes[12..16]) as usize;
    if dimension == 0 {
        return Err(CairaError::CorruptIndex("zero vector dimension".into()));
    }
    let count = usize::try_from(read_u64(&bytes[16..24]))
        .map_err(|_| CairaError::CorruptIndex("vector count out of range".into()))?;

    let payload = &body[HEADER_LEN..];
    let expected_len = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| CairaError::CorruptIndex("payload size overflows".into()))?;
    if payload.len() != expected_len {
        return Err(CairaError::CorruptIndex(format!(
            "expected {expected_len} payload bytes for {count} x {dimension} vectors, found {}",
            payload.len()
        )));
    }

    Ok(DecodedIndex {
        dimension,
        count,
        vectors: bytes_to_floats(payload),
    })
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut arr = [0u8; 4];
    arr.copy_from_slice(bytes);
    u32::from_le_bytes(arr)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(bytes);
    u64::from_le_bytes(arr)
}

fn floats_to_bytes(floats: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(floats.len() * 4);
    for f in floats {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

fn bytes_to_floats(bytes: &[u8]) -> Vec<f32> {
    let mut floats = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        let arr: [u8; 4] = [chunk[0], chunk[1], chunk[2], chunk[3]];
        floats.push(f32::from_le_bytes(arr));
    }
    floats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        encode(3, &[0.1, 0.2, 0.3, -1.0, 0.0, 1.0]).unwrap()
    }

    #[test]
    fn header_layout() {
        let bytes = sample();
        assert_eq!(&bytes[..8], b"CAIRAIDX");
        assert_eq!(read_u32(&bytes[8..12]), 1);
        assert_eq!(read_u32(&bytes[12..16]), 3);
        assert_eq!(read_u64(&bytes[16..24]), 2);
        assert_eq!(bytes.len(), HEADER_LEN + 6 * 4 + CHECKSUM_LEN);
    }

    #[test]
    fn decode_preserves_bits() {
        let values = [f32::MIN_POSITIVE, -0.0, 1e-30, 12345.678];
        let decoded = decode(&encode(2, &values).unwrap()).unwrap();
        let original: Vec<u32> = values.iter().map(|f| f.to_bits()).collect();
        let restored: Vec<u32> = decoded.vectors.iter().map(|f| f.to_bits()).collect();
        assert_eq!(original, restored);
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let mut bytes = sample();
        bytes[HEADER_LEN + 5] ^= 0x01;
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, CairaError::CorruptIndex(ref m) if m.contains("checksum")));
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let mut bytes = sample();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(CairaError::CorruptIndex(_))));
    }

    #[test]
    fn unknown_version_is_corrupt() {
        let mut bytes = sample();
        bytes[8..12].copy_from_slice(&7u32.to_le_bytes());
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, CairaError::CorruptIndex(ref m) if m.contains("version 7")));
    }

    #[test]
    fn zero_dimension_is_corrupt() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&4u64.to_le_bytes());
        let checksum = Sha256::digest(&bytes);
        bytes.extend_from_slice(&checksum);

        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, CairaError::CorruptIndex(ref m) if m.contains("zero vector dimension")));
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let bytes = sample();
        assert!(matches!(
            decode(&bytes[..bytes.len() - 9]),
            Err(CairaError::CorruptIndex(_))
        ));
        assert!(matches!(decode(&bytes[..10]), Err(CairaError::CorruptIndex(_))));
    }

    #[test]
    fn count_disagreeing_with_payload_is_corrupt() {
        let mut bytes = sample();
        bytes.truncate(bytes.len() - CHECKSUM_LEN);
        bytes[16..24].copy_from_slice(&5u64.to_le_bytes());
        let checksum = Sha256::digest(&bytes);
        bytes.extend_from_slice(&checksum);
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, CairaError::CorruptIndex(ref m) if m.contains("payload")));
    }

    #[test]
    fn ragged_input_is_rejected() {
        assert!(matches!(
            encode(4, &[1.0, 2.0, 3.0]),
            Err(CairaError::InvalidInput(_))
        ));
        assert!(matches!(encode(0, &[]), Err(CairaError::InvalidInput(_))));
    }
}
