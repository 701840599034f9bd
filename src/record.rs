//! Resource Record wire codec — identical across all three formats.
//!
//! # On-disk layout (20-byte header + payload + 4-byte trailer, little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      4   magic        = "SBRC"
//!    4      2   version      = 1            (LE u16)
//!    6      2   flags        = 0            (LE u16, reserved)
//!    8      8   payload_len                 (LE u64)
//!   16      4   checksum     CRC32(payload) (LE u32)
//!   20      N   payload
//! 20+N      4   trailer      = "CRBS"  (magic mirrored)
//! ```
//!
//! The record is what actually lives inside a container, so extraction
//! produces byte-identical payloads regardless of which format the resource
//! was injected into.  Encoding and decoding are pure total functions over
//! byte buffers; size limits are enforced on encode, and magic, version,
//! trailer, and CRC are all mandatory on decode — there is no opt-out.

use crc32fast::Hasher;

use crate::error::{InjectError, Result};
use crate::resource::ResourceKind;

/// Record header magic.
pub const RECORD_MAGIC: [u8; 4] = *b"SBRC";

/// Record trailer: the magic, mirrored.
pub const RECORD_TRAILER: [u8; 4] = *b"CRBS";

/// Current record layout version.
pub const RECORD_VERSION: u16 = 1;

/// Fixed header size preceding the payload.
pub const RECORD_HEADER_SIZE: usize = 20;

/// Fixed trailer size following the payload.
pub const RECORD_TRAILER_SIZE: usize = 4;

/// Header fields of an encoded record, without the payload copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordInfo {
    pub payload_len: u64,
    pub checksum: u32,
}

/// Total encoded size for a payload of `payload_len` bytes.
pub fn encoded_len(payload_len: u64) -> u64 {
    RECORD_HEADER_SIZE as u64 + payload_len + RECORD_TRAILER_SIZE as u64
}

/// Encode `payload` as a resource record for `kind`.
///
/// Rejects empty payloads and payloads over the kind's limit before
/// touching the checksum, so the cheap failures come first.
pub fn encode_record(kind: ResourceKind, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.is_empty() {
        return Err(InjectError::EmptyPayload);
    }
    let limit = kind.max_payload();
    if payload.len() as u64 > limit {
        return Err(InjectError::SizeLimitExceeded {
            what: format!("{kind} payload"),
            actual: payload.len() as u64,
            limit,
        });
    }

    let mut h = Hasher::new();
    h.update(payload);
    let checksum = h.finalize();

    let mut out =
        Vec::with_capacity(RECORD_HEADER_SIZE + payload.len() + RECORD_TRAILER_SIZE);
    out.extend_from_slice(&RECORD_MAGIC);
    out.extend_from_slice(&RECORD_VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // flags, reserved
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&checksum.to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&RECORD_TRAILER);
    Ok(out)
}

/// Validate the header of an encoded record without verifying the CRC.
///
/// Used by `list`, which reports sizes and checksums but does not need to
/// touch the payload bytes.  The declared length is still bounds-checked
/// against the container region.
pub fn peek_record(bytes: &[u8]) -> Result<RecordInfo> {
    if bytes.len() < RECORD_HEADER_SIZE + RECORD_TRAILER_SIZE {
        return Err(InjectError::IntegrityError(format!(
            "container region is {} bytes, smaller than an empty record",
            bytes.len()
        )));
    }
    if bytes[0..4] != RECORD_MAGIC {
        return Err(InjectError::IntegrityError(
            "record magic mismatch".into(),
        ));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != RECORD_VERSION {
        return Err(InjectError::IntegrityError(format!(
            "record version {version} (this build handles v{RECORD_VERSION})"
        )));
    }
    let payload_len = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
    let need = encoded_len(payload_len);
    if need > bytes.len() as u64 {
        return Err(InjectError::IntegrityError(format!(
            "record declares {payload_len} payload bytes but the container holds only {}",
            bytes.len()
        )));
    }
    let checksum = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
    Ok(RecordInfo {
        payload_len,
        checksum,
    })
}

/// Decode a record, verifying magic, version, trailer, and CRC32.
///
/// Returns the payload bytes.  Verification order: header fields first
/// (cheap), then the trailer, then the CRC over the whole payload.
pub fn decode_record(bytes: &[u8]) -> Result<Vec<u8>> {
    let info = peek_record(bytes)?;
    let payload_end = RECORD_HEADER_SIZE + info.payload_len as usize;
    let payload = &bytes[RECORD_HEADER_SIZE..payload_end];

    let trailer = &bytes[payload_end..payload_end + RECORD_TRAILER_SIZE];
    if trailer != RECORD_TRAILER {
        return Err(InjectError::IntegrityError(
            "record trailer does not mirror the magic".into(),
        ));
    }

    let mut h = Hasher::new();
    h.update(payload);
    let actual = h.finalize();
    if actual != info.checksum {
        return Err(InjectError::IntegrityError(format!(
            "payload CRC32 mismatch: expected {:#010x}, got {actual:#010x}",
            info.checksum
        )));
    }

    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_trip() {
        let payload = b"Hello, binject!";
        let rec = encode_record(ResourceKind::Sea, payload).unwrap();
        assert_eq!(rec.len(), RECORD_HEADER_SIZE + payload.len() + RECORD_TRAILER_SIZE);
        assert_eq!(decode_record(&rec).unwrap(), payload);
    }

    #[test]
    fn empty_payload_rejected() {
        assert!(matches!(
            encode_record(ResourceKind::Sea, b""),
            Err(InjectError::EmptyPayload)
        ));
    }

    #[test]
    fn oversize_payload_rejected() {
        // A 100 MiB + 1 zero-filled vec is cheap enough to allocate once.
        let big = vec![0u8; (crate::resource::MAX_SEA_SIZE + 1) as usize];
        assert!(matches!(
            encode_record(ResourceKind::Sea, &big),
            Err(InjectError::SizeLimitExceeded { .. })
        ));
    }

    #[test]
    fn corrupt_payload_fails_crc() {
        let mut rec = encode_record(ResourceKind::Sea, b"payload bytes").unwrap();
        rec[RECORD_HEADER_SIZE] ^= 0xFF;
        assert!(matches!(
            decode_record(&rec),
            Err(InjectError::IntegrityError(_))
        ));
    }

    #[test]
    fn corrupt_trailer_fails() {
        let mut rec = encode_record(ResourceKind::Sea, b"payload bytes").unwrap();
        let n = rec.len();
        rec[n - 1] ^= 0xFF;
        assert!(matches!(
            decode_record(&rec),
            Err(InjectError::IntegrityError(_))
        ));
    }

    #[test]
    fn wrong_version_fails() {
        let mut rec = encode_record(ResourceKind::Sea, b"x").unwrap();
        rec[4] = 9;
        assert!(decode_record(&rec).is_err());
    }

    #[test]
    fn truncated_container_fails_peek() {
        let rec = encode_record(ResourceKind::Sea, b"some payload").unwrap();
        assert!(peek_record(&rec[..RECORD_HEADER_SIZE + 2]).is_err());
    }

    proptest! {
        #[test]
        fn round_trips_arbitrary_payloads(payload in proptest::collection::vec(any::<u8>(), 1..4096)) {
            let rec = encode_record(ResourceKind::Vfs, &payload).unwrap();
            prop_assert_eq!(decode_record(&rec).unwrap(), payload);
        }
    }
}
