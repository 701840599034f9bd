//! Format engines — one per executable container format, behind a shared
//! contract.
//!
//! Engines are pure transformations: they take the whole binary as an
//! in-memory buffer and produce a new buffer; nothing is mutated in place
//! and nothing touches the filesystem.  The shared design constraint is
//! that injected data always lands past the original end of file, so the
//! loader-critical regions of the input survive byte-for-byte (modulo the
//! header-table updates each format mandates).

use crate::detect::Format;
use crate::error::{InjectError, Result};
use crate::record::{decode_record, peek_record};
use crate::resource::{ResourceKind, ALL_KINDS};

mod elf;
mod macho;
mod pe;

pub(crate) use macho::strip_code_signature;

/// What `list` reports for one injected resource.
#[derive(Debug, Clone)]
pub struct ResourceSummary {
    pub kind: ResourceKind,
    /// Format-specific container identifier, printed verbatim.
    pub container_name: String,
    /// Absolute file offset of the resource record.
    pub file_offset: u64,
    pub payload_len: u64,
    pub checksum: u32,
}

/// Per-format engine, dispatched as a tagged variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    MachO,
    Elf,
    Pe,
}

impl Engine {
    /// Engine for a detected format; `None` for `Unknown`.
    pub fn for_format(format: Format) -> Option<Engine> {
        match format {
            Format::MachO => Some(Engine::MachO),
            Format::Elf => Some(Engine::Elf),
            Format::Pe => Some(Engine::Pe),
            Format::Unknown => None,
        }
    }

    pub fn format(self) -> Format {
        match self {
            Engine::MachO => Format::MachO,
            Engine::Elf => Format::Elf,
            Engine::Pe => Format::Pe,
        }
    }

    /// Locate the raw container region for `kind`: `(file_offset, size)`.
    pub fn find_region(self, bin: &[u8], kind: ResourceKind) -> Result<Option<(u64, u64)>> {
        match self {
            Engine::MachO => macho::find_region(bin, kind),
            Engine::Elf => elf::find_region(bin, kind),
            Engine::Pe => pe::find_region(bin, kind),
        }
    }

    /// Summary of `kind`'s record, if the container is present.
    pub fn find(self, bin: &[u8], kind: ResourceKind) -> Result<Option<ResourceSummary>> {
        let Some((off, size)) = self.find_region(bin, kind)? else {
            return Ok(None);
        };
        let region = region_slice(bin, off, size)?;
        let info = peek_record(region)?;
        Ok(Some(ResourceSummary {
            kind,
            container_name: kind.container_name(self.format()),
            file_offset: off,
            payload_len: info.payload_len,
            checksum: info.checksum,
        }))
    }

    /// Every injected resource, in kind order.
    ///
    /// `list` is diagnostic: a file whose headers cannot be walked reports
    /// no resources instead of failing (a bare magic number with nothing
    /// behind it is still "a Mach-O with no resources").
    pub fn list(self, bin: &[u8]) -> Result<Vec<ResourceSummary>> {
        let mut out = Vec::new();
        for kind in ALL_KINDS {
            match self.find(bin, kind) {
                Ok(Some(summary)) => out.push(summary),
                Ok(None) => {}
                Err(InjectError::MalformedBinary(_)) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// Add or replace the container for `kind`; `record` is the encoded
    /// resource record.  Returns the new binary.
    pub fn insert_or_replace(self, bin: &[u8], kind: ResourceKind, record: &[u8]) -> Result<Vec<u8>> {
        tracing::debug!(kind = %kind, record_len = record.len(), engine = ?self, "insert_or_replace");
        match self {
            Engine::MachO => macho::insert_or_replace(bin, kind, record),
            Engine::Elf => elf::insert_or_replace(bin, kind, record),
            Engine::Pe => pe::insert_or_replace(bin, kind, record),
        }
    }

    /// Drop the container for `kind`; `NotFound` if absent.
    pub fn remove(self, bin: &[u8], kind: ResourceKind) -> Result<Vec<u8>> {
        match self {
            Engine::MachO => macho::remove(bin, kind),
            Engine::Elf => elf::remove(bin, kind),
            Engine::Pe => pe::remove(bin, kind),
        }
    }

    /// Decode and return `kind`'s payload; `NotFound` if absent,
    /// `IntegrityError` on any checksum/framing mismatch.
    pub fn extract(self, bin: &[u8], kind: ResourceKind) -> Result<Vec<u8>> {
        let Some((off, size)) = self.find_region(bin, kind)? else {
            return Err(InjectError::NotFound(kind));
        };
        decode_record(region_slice(bin, off, size)?)
    }
}

fn region_slice(bin: &[u8], off: u64, size: u64) -> Result<&[u8]> {
    let start = usize::try_from(off)
        .map_err(|_| InjectError::MalformedBinary(format!("container offset {off} overflows")))?;
    let len = usize::try_from(size)
        .map_err(|_| InjectError::MalformedBinary(format!("container size {size} overflows")))?;
    crate::endian::slice(bin, start, len)
}
