//! Compressed-stub bridge: unwrap, delegate, re-wrap.
//!
//! A stub is a Mach-O/ELF/PE binary whose SMOL_COMPRESSED container holds a
//! compressed image of an *inner* executable.  Injection must target the
//! inner executable, so the bridge splits the payload, hands the image to
//! the external decompressor, and later re-frames the compressor's output.
//! The bridge never compresses or decompresses anything itself.
//!
//! # Payload framing (inside the SMOL_COMPRESSED resource record)
//!
//! ```text
//! Offset  Size  Field
//!    0   1176   SMFG aux-config record (see auxcfg.rs)
//! 1176      8   inner_size — decompressed inner executable bytes (LE u64)
//! 1184      4   algo — compression algorithm identifier (LE u32)
//! 1188      N   compressed image (opaque to this core)
//! ```

use std::path::Path;

use crate::auxcfg::{AUX_MAGIC, AUX_RECORD_SIZE};
use crate::collab::Collaborator;
use crate::error::{InjectError, Result};

/// Bytes between the aux record and the compressed image.
pub const STUB_SIZE_FIELD: usize = 8;
pub const STUB_ALGO_FIELD: usize = 4;
pub const STUB_HEADER_SIZE: usize = AUX_RECORD_SIZE + STUB_SIZE_FIELD + STUB_ALGO_FIELD;

/// Nested stubs terminate here rather than recursing forever.
pub const MAX_STUB_DEPTH: usize = 4;

/// A decoded SMOL_COMPRESSED payload.
#[derive(Debug, Clone)]
pub struct StubPayload {
    /// Raw 1176-byte SMFG record, preserved verbatim unless the inject
    /// carries a replacement.
    pub aux_record: Vec<u8>,
    /// Declared size of the decompressed inner executable.
    pub inner_size: u64,
    /// Compression algorithm identifier (opaque; round-tripped).
    pub algo: u32,
    /// Compressed inner image.
    pub image: Vec<u8>,
}

/// Split a SMOL_COMPRESSED payload into aux record, sizes, and image.
pub fn split_stub_payload(payload: &[u8]) -> Result<StubPayload> {
    if payload.len() < STUB_HEADER_SIZE {
        return Err(InjectError::MalformedBinary(format!(
            "SMOL_COMPRESSED payload is {} bytes, header alone is {STUB_HEADER_SIZE}",
            payload.len()
        )));
    }
    if payload[0..4] != AUX_MAGIC {
        return Err(InjectError::MalformedBinary(
            "SMOL_COMPRESSED payload does not begin with an aux-config record".into(),
        ));
    }
    let inner_size = u64::from_le_bytes(
        payload[AUX_RECORD_SIZE..AUX_RECORD_SIZE + 8].try_into().unwrap(),
    );
    let algo = u32::from_le_bytes(
        payload[AUX_RECORD_SIZE + 8..STUB_HEADER_SIZE].try_into().unwrap(),
    );
    Ok(StubPayload {
        aux_record: payload[..AUX_RECORD_SIZE].to_vec(),
        inner_size,
        algo,
        image: payload[STUB_HEADER_SIZE..].to_vec(),
    })
}

/// Frame a new SMOL_COMPRESSED payload.
pub fn build_stub_payload(aux_record: &[u8], inner_size: u64, algo: u32, image: &[u8]) -> Vec<u8> {
    debug_assert_eq!(aux_record.len(), AUX_RECORD_SIZE);
    let mut out = Vec::with_capacity(STUB_HEADER_SIZE + image.len());
    out.extend_from_slice(aux_record);
    out.extend_from_slice(&inner_size.to_le_bytes());
    out.extend_from_slice(&algo.to_le_bytes());
    out.extend_from_slice(image);
    out
}

/// Hand the compressed image to the external decompressor and return the
/// inner executable bytes.  `scratch` hosts the temp files and outlives the
/// call; it is removed with the rest of the scoped temp dir on every exit
/// path.
pub fn decompress_inner(
    stub: &StubPayload,
    scratch: &Path,
    collab: &dyn Collaborator,
) -> Result<Vec<u8>> {
    let image_path = scratch.join("stub-image.bin");
    let inner_path = scratch.join("stub-inner.bin");
    std::fs::write(&image_path, &stub.image)?;

    collab.decompress(&image_path, &inner_path)?;

    let inner = std::fs::read(&inner_path).map_err(|e| InjectError::CollaboratorError {
        name: "decompressor",
        detail: format!("produced no readable output: {e}"),
    })?;
    if stub.inner_size != 0 && inner.len() as u64 != stub.inner_size {
        return Err(InjectError::MalformedBinary(format!(
            "stub declares a {}-byte inner executable, decompressor produced {}",
            stub.inner_size,
            inner.len()
        )));
    }
    tracing::debug!(inner_len = inner.len(), algo = stub.algo, "stub unwrapped");
    Ok(inner)
}

/// Hand the mutated inner executable to the external compressor and return
/// the new compressed image.  `stub_path` is the original stub on disk,
/// passed through so the compressor can reuse its settings.
pub fn compress_inner(
    inner: &[u8],
    stub_path: &Path,
    scratch: &Path,
    collab: &dyn Collaborator,
) -> Result<Vec<u8>> {
    let inner_path = scratch.join("stub-inner-new.bin");
    let image_path = scratch.join("stub-image-new.bin");
    std::fs::write(&inner_path, inner)?;

    collab.compress(&inner_path, &image_path, Some(stub_path))?;

    std::fs::read(&image_path).map_err(|e| InjectError::CollaboratorError {
        name: "compressor",
        detail: format!("produced no readable output: {e}"),
    })
}
