//! External collaborator processes, behind a capability trait.
//!
//! No function elsewhere in the core spawns a process: the orchestrator,
//! stub bridge, and config pipeline all go through [`Collaborator`], so
//! tests substitute in-crate fakes.  The process-backed implementation
//! enforces per-call timeouts and honours the crate-wide cancellation flag
//! set by the CLI's signal handler.
//!
//! # Process contracts
//!
//! | capability    | command line                                   | timeout |
//! |---------------|------------------------------------------------|---------|
//! | sign          | `codesign --sign - --force PATH`               | 30 s    |
//! | decompress    | `<decompressor> INPUT -o OUTPUT`               | 180 s   |
//! | compress      | `<compressor> INPUT -o OUTPUT [-u EXISTING]`   | 180 s   |
//! | generate_blob | `<runtime> --experimental-sea-config CONFIG`   | 60 s    |
//!
//! Exit code 0 is the only success signal; stderr is captured to a scratch
//! file (never a pipe, so a chatty child cannot deadlock the single-threaded
//! poll loop) and surfaced in the error on failure.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{InjectError, Result};

pub const SIGN_TIMEOUT: Duration = Duration::from_secs(30);
pub const BLOB_TIMEOUT: Duration = Duration::from_secs(60);
pub const CODEC_TIMEOUT: Duration = Duration::from_secs(180);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

// ── Cancellation ─────────────────────────────────────────────────────────────

static CANCELLED: AtomicBool = AtomicBool::new(false);

/// Mark the process as cancelled.  Safe to call from a signal handler.
pub fn request_cancel() {
    CANCELLED.store(true, Ordering::SeqCst);
}

pub fn is_cancelled() -> bool {
    CANCELLED.load(Ordering::SeqCst)
}

/// Error out if a cancellation signal has been received.  The orchestrator
/// calls this at every suspension point.
pub fn check_cancelled() -> Result<()> {
    if is_cancelled() {
        Err(InjectError::Cancelled)
    } else {
        Ok(())
    }
}

// ── Capability trait ─────────────────────────────────────────────────────────

/// The external tools the core delegates to.
pub trait Collaborator {
    /// Ad-hoc code signing of the binary at `binary` (macOS `codesign`).
    fn sign(&self, binary: &Path) -> Result<()>;

    /// Decompress the image at `input` into `output`.
    fn decompress(&self, input: &Path, output: &Path) -> Result<()>;

    /// Compress the executable at `input` into `output`, optionally reusing
    /// settings from `existing_stub`.
    fn compress(&self, input: &Path, output: &Path, existing_stub: Option<&Path>) -> Result<()>;

    /// Run the runtime's SEA blob generator against `config` in `workdir`.
    fn generate_blob(&self, config: &Path, workdir: &Path) -> Result<()>;
}

// ── Process-backed implementation ────────────────────────────────────────────

/// Collaborator tool paths, resolved once by the CLI (environment reads
/// happen there, not in the core).
#[derive(Debug, Clone)]
pub struct ProcessCollaborator {
    pub signer: PathBuf,
    pub compressor: PathBuf,
    pub decompressor: PathBuf,
    pub runtime: PathBuf,
}

impl Default for ProcessCollaborator {
    fn default() -> Self {
        Self {
            signer: PathBuf::from("codesign"),
            compressor: PathBuf::from("smol-compress"),
            decompressor: PathBuf::from("smol-decompress"),
            runtime: PathBuf::from("node"),
        }
    }
}

impl Collaborator for ProcessCollaborator {
    fn sign(&self, binary: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.signer);
        cmd.args(["--sign", "-", "--force"]).arg(binary);
        run(cmd, "signer", SIGN_TIMEOUT).map_err(|e| match e {
            InjectError::CollaboratorError { detail, .. } => InjectError::SigningFailed(detail),
            other => other,
        })
    }

    fn decompress(&self, input: &Path, output: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.decompressor);
        cmd.arg(input).arg("-o").arg(output);
        run(cmd, "decompressor", CODEC_TIMEOUT)
    }

    fn compress(&self, input: &Path, output: &Path, existing_stub: Option<&Path>) -> Result<()> {
        let mut cmd = Command::new(&self.compressor);
        cmd.arg(input).arg("-o").arg(output);
        if let Some(stub) = existing_stub {
            cmd.arg("-u").arg(stub);
        }
        run(cmd, "compressor", CODEC_TIMEOUT)
    }

    fn generate_blob(&self, config: &Path, workdir: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.runtime);
        cmd.arg("--experimental-sea-config").arg(config).current_dir(workdir);
        run(cmd, "blob generator", BLOB_TIMEOUT).map_err(|e| match e {
            InjectError::CollaboratorError { detail, .. } => {
                InjectError::BlobGenerationFailed(detail)
            }
            other => other,
        })
    }
}

/// Spawn and poll to completion, killing the child on timeout or
/// cancellation.
fn run(mut cmd: Command, name: &'static str, timeout: Duration) -> Result<()> {
    check_cancelled()?;

    let stderr_file = tempfile::NamedTempFile::new()?;
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(stderr_file.reopen()?);

    tracing::debug!(collaborator = name, command = ?cmd, "spawning");
    let mut child = cmd.spawn().map_err(|e| InjectError::CollaboratorError {
        name,
        detail: format!("failed to spawn: {e}"),
    })?;

    let started = Instant::now();
    let status = loop {
        if is_cancelled() {
            kill_quietly(&mut child);
            return Err(InjectError::Cancelled);
        }
        match child.try_wait()? {
            Some(status) => break status,
            None => {
                if started.elapsed() > timeout {
                    kill_quietly(&mut child);
                    return Err(InjectError::CollaboratorTimeout {
                        name,
                        secs: timeout.as_secs(),
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    };

    if status.success() {
        return Ok(());
    }
    let stderr = std::fs::read_to_string(stderr_file.path()).unwrap_or_default();
    let stderr = stderr.trim();
    Err(InjectError::CollaboratorError {
        name,
        detail: if stderr.is_empty() {
            format!("exited with {status}")
        } else {
            format!("exited with {status}: {stderr}")
        },
    })
}

fn kill_quietly(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
