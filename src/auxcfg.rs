//! Fixed-layout configuration records.
//!
//! # SMFG record — update-checker settings (1176 bytes, little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      4   magic 'SMFG'
//!    4      2   version = 1                (LE u16)
//!    6      1   prompt_flag (0|1)
//!    7      1   prompt_default (ASCII 'y'|'n')
//!    8      8   interval_ms                (LE i64)
//!   16      8   notify_interval_ms         (LE i64)
//!   24    128   binname        u8  len ≤127, bytes, zero-padded
//!  152    256   command        u16 len ≤254, bytes, zero-padded
//!  408    512   url            u16 len ≤510, bytes, zero-padded
//!  920    128   tag            u8  len ≤127, bytes, zero-padded
//! 1048     64   skip_env       u8  len ≤63,  bytes, zero-padded
//! 1112     64   fake_argv_env  u8  len ≤63,  bytes, zero-padded
//! ```
//!
//! Unused string bytes MUST be zero; serialization and parsing are inverse
//! and byte-exact.  String length limits are enforced by SEA-config
//! validation upstream — the serializer asserts them as invariants.
//!
//! # SVFS record — virtual-filesystem settings (268 bytes, little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      4   magic 'SVFS'
//!    4      2   version = 1                (LE u16)
//!    6      1   mode  0=in-memory 1=on-disk 2=compat
//!    7      1   reserved (zero)
//!    8    256   prefix         u16 len ≤254, bytes, zero-padded
//!  264      4   crc32 of bytes [0..264]    (LE u32)
//! ```
//!
//! The SVFS record is produced for the external VFS archiver and stub
//! runtime; this core never embeds it in a binary.

use std::path::PathBuf;

use crc32fast::Hasher;

use crate::error::{InjectError, Result};

// ── SMFG constants ───────────────────────────────────────────────────────────

pub const AUX_MAGIC: [u8; 4] = *b"SMFG";
pub const AUX_VERSION: u16 = 1;
pub const AUX_RECORD_SIZE: usize = 1176;

pub const MAX_BINNAME: usize = 127;
pub const MAX_COMMAND: usize = 254;
pub const MAX_URL: usize = 510;
pub const MAX_TAG: usize = 127;
pub const MAX_SKIP_ENV: usize = 63;
pub const MAX_FAKE_ARGV_ENV: usize = 63;

pub const DEFAULT_COMMAND: &str = "self-update";
pub const DEFAULT_INTERVAL_MS: i64 = 86_400_000;
pub const DEFAULT_FAKE_ARGV_ENV: &str = "SMOL_FAKE_ARGV";

/// Update-checker settings as carried in the SMFG record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateConfig {
    pub prompt: bool,
    /// ASCII `'y'` or `'n'`.
    pub prompt_default: u8,
    pub interval_ms: i64,
    pub notify_interval_ms: i64,
    pub binname: String,
    pub command: String,
    pub url: String,
    pub tag: String,
    pub skip_env: String,
    pub fake_argv_env: String,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            prompt: false,
            prompt_default: b'n',
            interval_ms: DEFAULT_INTERVAL_MS,
            notify_interval_ms: DEFAULT_INTERVAL_MS,
            binname: String::new(),
            command: DEFAULT_COMMAND.to_owned(),
            url: String::new(),
            tag: String::new(),
            skip_env: String::new(),
            fake_argv_env: DEFAULT_FAKE_ARGV_ENV.to_owned(),
        }
    }
}

// ── Field helpers ────────────────────────────────────────────────────────────

/// `u8` length prefix + bytes, zero-padded to `field` bytes total.
fn put_str_u8(buf: &mut [u8], off: usize, field: usize, s: &str) {
    assert!(s.len() < field, "string field overflow must be caught by validation");
    buf[off] = s.len() as u8;
    buf[off + 1..off + 1 + s.len()].copy_from_slice(s.as_bytes());
    // bytes up to off+field stay zero
}

/// `u16 LE` length prefix + bytes, zero-padded to `field` bytes total.
fn put_str_u16(buf: &mut [u8], off: usize, field: usize, s: &str) {
    assert!(s.len() + 1 < field, "string field overflow must be caught by validation");
    buf[off..off + 2].copy_from_slice(&(s.len() as u16).to_le_bytes());
    buf[off + 2..off + 2 + s.len()].copy_from_slice(s.as_bytes());
}

fn get_str_u8(buf: &[u8], off: usize, field: usize, name: &str) -> Result<String> {
    let len = buf[off] as usize;
    if len + 1 > field {
        return Err(InjectError::IntegrityError(format!(
            "{name} length {len} overflows its {field}-byte field"
        )));
    }
    bytes_to_string(&buf[off + 1..off + 1 + len], name)
}

fn get_str_u16(buf: &[u8], off: usize, field: usize, name: &str) -> Result<String> {
    let len = u16::from_le_bytes([buf[off], buf[off + 1]]) as usize;
    if len + 2 > field {
        return Err(InjectError::IntegrityError(format!(
            "{name} length {len} overflows its {field}-byte field"
        )));
    }
    bytes_to_string(&buf[off + 2..off + 2 + len], name)
}

fn bytes_to_string(bytes: &[u8], name: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| InjectError::IntegrityError(format!("{name} is not valid UTF-8")))
}

// ── SMFG serialize / parse ───────────────────────────────────────────────────

/// Emit the 1176-byte SMFG record.  Byte-exact; string bounds are asserted
/// (validation happens in the SEA-config parser, not here).
pub fn serialize_update_config(cfg: &UpdateConfig) -> [u8; AUX_RECORD_SIZE] {
    let mut buf = [0u8; AUX_RECORD_SIZE];
    buf[0..4].copy_from_slice(&AUX_MAGIC);
    buf[4..6].copy_from_slice(&AUX_VERSION.to_le_bytes());
    buf[6] = cfg.prompt as u8;
    buf[7] = cfg.prompt_default;
    buf[8..16].copy_from_slice(&cfg.interval_ms.to_le_bytes());
    buf[16..24].copy_from_slice(&cfg.notify_interval_ms.to_le_bytes());
    put_str_u8(&mut buf, 24, 128, &cfg.binname);
    put_str_u16(&mut buf, 152, 256, &cfg.command);
    put_str_u16(&mut buf, 408, 512, &cfg.url);
    put_str_u8(&mut buf, 920, 128, &cfg.tag);
    put_str_u8(&mut buf, 1048, 64, &cfg.skip_env);
    put_str_u8(&mut buf, 1112, 64, &cfg.fake_argv_env);
    buf
}

/// Parse a 1176-byte SMFG record, validating magic, version, and field
/// bounds.
pub fn parse_update_config(bytes: &[u8]) -> Result<UpdateConfig> {
    if bytes.len() < AUX_RECORD_SIZE {
        return Err(InjectError::IntegrityError(format!(
            "aux-config record is {} bytes, expected {AUX_RECORD_SIZE}",
            bytes.len()
        )));
    }
    if bytes[0..4] != AUX_MAGIC {
        return Err(InjectError::IntegrityError("aux-config magic mismatch".into()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != AUX_VERSION {
        return Err(InjectError::IntegrityError(format!(
            "aux-config version {version} (this build handles v{AUX_VERSION})"
        )));
    }
    let prompt = match bytes[6] {
        0 => false,
        1 => true,
        v => {
            return Err(InjectError::IntegrityError(format!(
                "aux-config prompt flag {v} is neither 0 nor 1"
            )))
        }
    };
    let prompt_default = bytes[7];
    if prompt_default != b'y' && prompt_default != b'n' {
        return Err(InjectError::IntegrityError(format!(
            "aux-config prompt default {prompt_default:#04x} is neither 'y' nor 'n'"
        )));
    }
    Ok(UpdateConfig {
        prompt,
        prompt_default,
        interval_ms: i64::from_le_bytes(bytes[8..16].try_into().unwrap()),
        notify_interval_ms: i64::from_le_bytes(bytes[16..24].try_into().unwrap()),
        binname: get_str_u8(bytes, 24, 128, "binname")?,
        command: get_str_u16(bytes, 152, 256, "command")?,
        url: get_str_u16(bytes, 408, 512, "url")?,
        tag: get_str_u8(bytes, 920, 128, "tag")?,
        skip_env: get_str_u8(bytes, 1048, 64, "skipEnv")?,
        fake_argv_env: get_str_u8(bytes, 1112, 64, "fakeArgvEnv")?,
    })
}

// ── SVFS record ──────────────────────────────────────────────────────────────

pub const VFS_MAGIC: [u8; 4] = *b"SVFS";
pub const VFS_VERSION: u16 = 1;
pub const VFS_RECORD_SIZE: usize = 268;

pub const DEFAULT_VFS_SOURCE: &str = "node_modules";
pub const DEFAULT_VFS_PREFIX: &str = "/";
pub const MAX_VFS_PREFIX: usize = 254;

/// How the stub runtime mounts the virtual filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VfsMode {
    #[default]
    InMemory,
    OnDisk,
    Compat,
}

impl VfsMode {
    pub fn as_u8(self) -> u8 {
        match self {
            VfsMode::InMemory => 0,
            VfsMode::OnDisk => 1,
            VfsMode::Compat => 2,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(VfsMode::InMemory),
            1 => Some(VfsMode::OnDisk),
            2 => Some(VfsMode::Compat),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VfsMode::InMemory => "in-memory",
            VfsMode::OnDisk => "on-disk",
            VfsMode::Compat => "compat",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "in-memory" => Some(VfsMode::InMemory),
            "on-disk" => Some(VfsMode::OnDisk),
            "compat" => Some(VfsMode::Compat),
            _ => None,
        }
    }
}

/// VFS sub-config: `(mode, source, prefix)`.  `source` is a build-time
/// path and is not serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsConfig {
    pub mode: VfsMode,
    pub source: PathBuf,
    pub prefix: String,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            mode: VfsMode::InMemory,
            source: PathBuf::from(DEFAULT_VFS_SOURCE),
            prefix: DEFAULT_VFS_PREFIX.to_owned(),
        }
    }
}

/// Emit the 268-byte SVFS record (mode + mount prefix, CRC-sealed).
pub fn serialize_vfs_config(cfg: &VfsConfig) -> [u8; VFS_RECORD_SIZE] {
    let mut buf = [0u8; VFS_RECORD_SIZE];
    buf[0..4].copy_from_slice(&VFS_MAGIC);
    buf[4..6].copy_from_slice(&VFS_VERSION.to_le_bytes());
    buf[6] = cfg.mode.as_u8();
    put_str_u16(&mut buf, 8, 256, &cfg.prefix);

    let mut h = Hasher::new();
    h.update(&buf[..VFS_RECORD_SIZE - 4]);
    let crc = h.finalize();
    buf[VFS_RECORD_SIZE - 4..].copy_from_slice(&crc.to_le_bytes());
    buf
}

/// Parse a 268-byte SVFS record, verifying magic, version, CRC, and mode.
/// The `source` field of the result is the default (it is not serialized).
pub fn parse_vfs_config(bytes: &[u8]) -> Result<VfsConfig> {
    if bytes.len() < VFS_RECORD_SIZE {
        return Err(InjectError::IntegrityError(format!(
            "VFS record is {} bytes, expected {VFS_RECORD_SIZE}",
            bytes.len()
        )));
    }
    if bytes[0..4] != VFS_MAGIC {
        return Err(InjectError::IntegrityError("VFS record magic mismatch".into()));
    }
    let stored = u32::from_le_bytes(bytes[VFS_RECORD_SIZE - 4..VFS_RECORD_SIZE].try_into().unwrap());
    let mut h = Hasher::new();
    h.update(&bytes[..VFS_RECORD_SIZE - 4]);
    if h.finalize() != stored {
        return Err(InjectError::IntegrityError("VFS record CRC32 mismatch".into()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VFS_VERSION {
        return Err(InjectError::IntegrityError(format!(
            "VFS record version {version} (this build handles v{VFS_VERSION})"
        )));
    }
    let mode = VfsMode::from_u8(bytes[6]).ok_or_else(|| {
        InjectError::IntegrityError(format!("VFS record mode {} is unknown", bytes[6]))
    })?;
    Ok(VfsConfig {
        mode,
        source: PathBuf::from(DEFAULT_VFS_SOURCE),
        prefix: get_str_u16(bytes, 8, 256, "prefix")?,
    })
}
