//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the core returns [`Result`].  Nothing is
//! recovered internally; errors bubble to the orchestrator, which deletes
//! partial output and releases scoped resources, and the CLI is the only
//! site that converts an error into a process exit code.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::resource::ResourceKind;

pub type Result<T> = std::result::Result<T, InjectError>;

#[derive(Error, Debug)]
pub enum InjectError {
    /// Missing or malformed CLI argument, or an invalid SEA config field.
    /// The message names the offending argument/field and the rule violated.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The detector classified the input as `Unknown`.
    #[error("unsupported executable format (not Mach-O, ELF, or PE)")]
    UnsupportedFormat,

    /// Header, offset, or size inconsistency inside a binary.
    #[error("malformed binary: {0}")]
    MalformedBinary(String),

    /// No room for a new load command / section header without rewriting
    /// the file body.  The only fix is rebuilding the input with more
    /// header padding.
    #[error("insufficient header slack: {0} (rebuild the input with more header padding)")]
    InsufficientHeaderSlack(String),

    /// A computed value does not fit the header field that must hold it.
    #[error("size overflow: {0}")]
    SizeOverflow(String),

    #[error("resource payload is empty")]
    EmptyPayload,

    #[error("{what} is {actual} bytes, limit is {limit}")]
    SizeLimitExceeded { what: String, actual: u64, limit: u64 },

    /// `extract`/`verify` asked for a resource kind that is not present.
    #[error("no {0} resource in this binary")]
    NotFound(ResourceKind),

    /// CRC32, magic, or trailer mismatch while decoding a resource record.
    #[error("integrity error: {0}")]
    IntegrityError(String),

    #[error("code signing failed: {0}")]
    SigningFailed(String),

    #[error("{name} did not finish within {secs} s")]
    CollaboratorTimeout { name: &'static str, secs: u64 },

    /// An external collaborator exited non-zero.
    #[error("{name} failed: {detail}")]
    CollaboratorError { name: &'static str, detail: String },

    #[error("cancelled")]
    Cancelled,

    /// The runtime's blob generator exited non-zero or produced no blob.
    #[error("SEA blob generation failed: {0}")]
    BlobGenerationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
