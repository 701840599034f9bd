//! Code signature management — active on Mach-O only.
//!
//! ELF carries no mandatory signature; a PE Authenticode signature is
//! stripped by the PE engine and not regenerated.  For Mach-O, any
//! `LC_CODE_SIGNATURE` must be removed before the engine mutates the file
//! (the old signature would no longer verify anyway), and a fresh ad-hoc
//! signature — enough for local execution on modern macOS — is applied by
//! the external signer once the output file exists.  No keys or
//! certificates are involved.

use std::path::Path;

use crate::collab::Collaborator;
use crate::detect::Format;
use crate::engine;
use crate::error::Result;

/// Strip any code signature before mutation.  Returns the (possibly
/// unchanged) buffer and whether a signature was removed.
pub fn strip_if_signed(format: Format, bin: Vec<u8>) -> Result<(Vec<u8>, bool)> {
    if format != Format::MachO {
        return Ok((bin, false));
    }
    match engine::strip_code_signature(&bin)? {
        Some(stripped) => {
            tracing::debug!("stripped existing code signature");
            Ok((stripped, true))
        }
        None => Ok((bin, false)),
    }
}

/// Apply an ad-hoc signature to the finished output file (Mach-O only).
/// The caller deletes the output on failure.
pub fn resign(format: Format, output: &Path, collab: &dyn Collaborator) -> Result<()> {
    if format != Format::MachO {
        return Ok(());
    }
    tracing::debug!(output = %output.display(), "applying ad-hoc signature");
    collab.sign(output)
}
