//! # binject — resource injection for native executables
//!
//! Embeds, lists, extracts, and verifies named resources in Mach-O, ELF,
//! and PE executables while preserving executability.  Primary clients are
//! packagers shipping a self-contained runtime with a SEA blob and an
//! optional VFS archive; compressed-stub wrappers are detected and
//! round-tripped transparently so injection targets the inner executable.
//!
//! Format guarantees (frozen in record v1):
//! - Injected data always lands past the original end of file; existing
//!   loader-critical regions are never moved, only the format's own
//!   segment/section/resource tables are extended
//! - Every resource is wrapped in a self-describing record: magic, version,
//!   declared length, mandatory CRC32, mirrored trailer — extraction is
//!   byte-identical across formats and CRC-verified, no opt-out
//! - Container identifiers are frozen ASCII names; `list` prints them
//!   verbatim and downstream tools grep for them
//! - Resources are keyed uniquely by kind: re-injection replaces, and
//!   repeated replacement reaches a fixed point instead of growing the file
//! - All record and header I/O is explicit about endianness; nothing
//!   depends on the host byte order
//! - External tools (signer, compressor, decompressor, blob generator) sit
//!   behind a capability trait; the core never spawns a process directly

pub mod auxcfg;
pub mod collab;
pub mod config;
pub mod detect;
pub mod endian;
pub mod engine;
pub mod error;
pub mod ops;
pub mod record;
pub mod resource;
pub mod sign;
pub mod stub;

// Flat re-exports for the most common types.
pub use auxcfg::{UpdateConfig, VfsConfig, VfsMode};
pub use collab::{Collaborator, ProcessCollaborator};
pub use config::{parse_sea_config, SeaConfig};
pub use detect::{detect_format, Format};
pub use engine::{Engine, ResourceSummary};
pub use error::{InjectError, Result};
pub use ops::{inject, list, verify, InjectOptions};
pub use record::{decode_record, encode_record};
pub use resource::ResourceKind;
