//! Resource kinds and their frozen per-format container identifiers.
//!
//! # Identity rules
//! Every injectable resource kind maps to a fixed segment/section (Mach-O),
//! section (ELF), or named resource (PE).  These identifiers are frozen:
//! `list` prints them verbatim and downstream tools grep for them, so they
//! are never renamed, reused, or negotiated.
//!
//! | kind            | Mach-O segment / section      | ELF section         | PE resource name    |
//! |-----------------|-------------------------------|---------------------|---------------------|
//! | SEA             | `__NODE_SEA` / `__NODE_SEA_BLOB` | `NODE_SEA_BLOB`  | `NODE_SEA_BLOB`     |
//! | VFS             | `__SMOL_VFS` / `__SMOL_VFS_BLOB` | `SMOL_VFS_BLOB`  | `SMOL_VFS_BLOB`     |
//! | SMOL_COMPRESSED | `__SMOL` / `__PRESSED_DATA`   | `SMOL_PRESSED_DATA` | `SMOL_PRESSED_DATA` |
//!
//! The aux-config record is not a standalone container; it rides inside the
//! SMOL_COMPRESSED payload (see `stub.rs`).

use std::fmt;

use crate::detect::Format;

/// Maximum accepted input binary size: 256 MiB.
pub const MAX_INPUT_SIZE: u64 = 256 * 1024 * 1024;

/// Maximum SEA payload: 100 MiB.
pub const MAX_SEA_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum VFS payload: 256 MiB.
pub const MAX_VFS_SIZE: u64 = 256 * 1024 * 1024;

/// PE resource type under which every kind is filed (RT_RCDATA).
pub const PE_RESOURCE_TYPE: u32 = 10;

/// A named resource kind, keyed uniquely within a binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Sea,
    Vfs,
    SmolCompressed,
}

/// All kinds, in the order `list` reports them.
pub const ALL_KINDS: [ResourceKind; 3] = [
    ResourceKind::Sea,
    ResourceKind::Vfs,
    ResourceKind::SmolCompressed,
];

impl ResourceKind {
    /// Mach-O segment name (≤16 bytes, NUL-padded on disk).
    pub fn macho_segment(self) -> &'static str {
        match self {
            ResourceKind::Sea => "__NODE_SEA",
            ResourceKind::Vfs => "__SMOL_VFS",
            ResourceKind::SmolCompressed => "__SMOL",
        }
    }

    /// Mach-O section name within [`Self::macho_segment`].
    pub fn macho_section(self) -> &'static str {
        match self {
            ResourceKind::Sea => "__NODE_SEA_BLOB",
            ResourceKind::Vfs => "__SMOL_VFS_BLOB",
            ResourceKind::SmolCompressed => "__PRESSED_DATA",
        }
    }

    /// ELF section name (also the `.shstrtab` entry).
    pub fn elf_section(self) -> &'static str {
        match self {
            ResourceKind::Sea => "NODE_SEA_BLOB",
            ResourceKind::Vfs => "SMOL_VFS_BLOB",
            ResourceKind::SmolCompressed => "SMOL_PRESSED_DATA",
        }
    }

    /// PE resource name under [`PE_RESOURCE_TYPE`], language 0.
    pub fn pe_resource_name(self) -> &'static str {
        self.elf_section()
    }

    /// Container identifier as printed by `list` for the given format.
    pub fn container_name(self, format: Format) -> String {
        match format {
            Format::MachO => format!("{}/{}", self.macho_segment(), self.macho_section()),
            Format::Elf => self.elf_section().to_owned(),
            Format::Pe => self.pe_resource_name().to_owned(),
            Format::Unknown => String::new(),
        }
    }

    /// Maximum payload size for this kind.
    pub fn max_payload(self) -> u64 {
        match self {
            ResourceKind::Sea => MAX_SEA_SIZE,
            ResourceKind::Vfs => MAX_VFS_SIZE,
            // The wrapper payload is bounded by the input-binary cap.
            ResourceKind::SmolCompressed => MAX_INPUT_SIZE,
        }
    }

    /// Resolve a Mach-O segment name back to a kind (for `list`).
    pub fn from_macho_segment(name: &str) -> Option<Self> {
        ALL_KINDS.into_iter().find(|k| k.macho_segment() == name)
    }

    /// Resolve an ELF section name back to a kind (for `list`).
    pub fn from_elf_section(name: &str) -> Option<Self> {
        ALL_KINDS.into_iter().find(|k| k.elf_section() == name)
    }

    /// Resolve a PE resource name back to a kind (for `list`).
    pub fn from_pe_resource_name(name: &str) -> Option<Self> {
        ALL_KINDS.into_iter().find(|k| k.pe_resource_name() == name)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Sea => "SEA",
            ResourceKind::Vfs => "VFS",
            ResourceKind::SmolCompressed => "SMOL_COMPRESSED",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macho_names_fit_sixteen_bytes() {
        for k in ALL_KINDS {
            assert!(k.macho_segment().len() <= 16, "{k} segment name too long");
            assert!(k.macho_section().len() <= 16, "{k} section name too long");
        }
    }

    #[test]
    fn name_lookups_invert() {
        for k in ALL_KINDS {
            assert_eq!(ResourceKind::from_macho_segment(k.macho_segment()), Some(k));
            assert_eq!(ResourceKind::from_elf_section(k.elf_section()), Some(k));
            assert_eq!(
                ResourceKind::from_pe_resource_name(k.pe_resource_name()),
                Some(k)
            );
        }
        assert_eq!(ResourceKind::from_elf_section(".text"), None);
    }
}
