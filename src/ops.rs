//! Top-level operations — the primary embedding surface.
//!
//! One invocation processes one binary: load the whole file, run the
//! engine pipeline as pure buffer transforms, write the result atomically.
//! The pipeline order is fixed: detect → unwrap? → encode → engine →
//! resign → wrap?; no step begins before the previous completes, and a
//! cancellation signal is honoured at every suspension point.  On any
//! error the partial output is deleted before the error propagates.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::auxcfg::{serialize_update_config, serialize_vfs_config, UpdateConfig, VfsMode};
use crate::collab::{check_cancelled, Collaborator};
use crate::config::{generate_sea_blob, looks_like_config, parse_sea_config};
use crate::detect::detect_format;
use crate::engine::{Engine, ResourceSummary};
use crate::error::{InjectError, Result};
use crate::record::encode_record;
use crate::resource::{ResourceKind, MAX_INPUT_SIZE};
use crate::sign;
use crate::stub::{
    build_stub_payload, compress_inner, decompress_inner, split_stub_payload, MAX_STUB_DEPTH,
};

/// Options for [`inject`].
#[derive(Debug, Clone, Default)]
pub struct InjectOptions {
    /// SEA blob path, or a SEA JSON config to generate one from.
    pub sea: Option<PathBuf>,
    /// Prebuilt VFS blob path.
    pub vfs: Option<PathBuf>,
    /// VFS mount mode; overrides the SEA config's `smol.vfs.mode`.
    pub vfs_mode: Option<VfsMode>,
    /// Treat a compressed stub as an ordinary binary (debugging aid).
    pub skip_repack: bool,
}

/// Everything resolved from the `--sea`/`--vfs` arguments before any
/// engine work starts.
struct ResolvedResources {
    sea: Vec<u8>,
    vfs: Option<Vec<u8>>,
    /// Present when the SEA argument was a JSON config carrying `smol`
    /// settings — replaces a stub's aux record on re-wrap.
    update: Option<UpdateConfig>,
}

// ── inject ───────────────────────────────────────────────────────────────────

pub fn inject(
    input: &Path,
    output: &Path,
    opts: &InjectOptions,
    collab: &dyn Collaborator,
) -> Result<()> {
    let Some(sea_path) = &opts.sea else {
        if opts.vfs.is_some() {
            return Err(InjectError::InvalidArg(
                "--vfs requires --sea: a VFS blob cannot exist without a SEA container".into(),
            ));
        }
        return Err(InjectError::InvalidArg(
            "nothing to inject: pass --sea and/or --vfs".into(),
        ));
    };

    check_cancelled()?;
    let bin = read_input(input)?;
    let format = detect_format(&bin);
    let engine = Engine::for_format(format).ok_or(InjectError::UnsupportedFormat)?;
    tracing::debug!(input = %input.display(), format = %format, "injecting");

    let resources = resolve_resources(sea_path, opts, collab)?;

    // Scoped scratch space for collaborator handoffs; removed on all exit
    // paths when this guard drops.
    let scratch = tempfile::tempdir()?;

    let mutated = transform(
        &bin,
        engine,
        &resources,
        opts.skip_repack,
        input,
        scratch.path(),
        collab,
        0,
    )?;

    check_cancelled()?;
    write_output(output, &mutated, true)?;

    if let Err(e) = sign::resign(format, output, collab) {
        let _ = std::fs::remove_file(output);
        return Err(e);
    }
    Ok(())
}

/// Apply the resources to one binary buffer, entering the stub bridge when
/// the binary is a compressed stub.
#[allow(clippy::too_many_arguments)]
fn transform(
    bin: &[u8],
    engine: Engine,
    resources: &ResolvedResources,
    skip_repack: bool,
    stub_src: &Path,
    scratch: &Path,
    collab: &dyn Collaborator,
    depth: usize,
) -> Result<Vec<u8>> {
    let is_stub = engine.find_region(bin, ResourceKind::SmolCompressed)?.is_some();
    if is_stub && !skip_repack {
        if depth >= MAX_STUB_DEPTH {
            return Err(InjectError::MalformedBinary(format!(
                "stub nesting exceeds {MAX_STUB_DEPTH} levels"
            )));
        }
        return transform_stub(bin, engine, resources, stub_src, scratch, collab, depth);
    }

    // Plain path: strip any signature, then apply SEA first, VFS second,
    // so the "VFS requires SEA" invariant is checkable at application time.
    let (mut out, _) = sign::strip_if_signed(engine.format(), bin.to_vec())?;
    let sea_record = encode_record(ResourceKind::Sea, &resources.sea)?;
    out = engine.insert_or_replace(&out, ResourceKind::Sea, &sea_record)?;
    if let Some(vfs) = &resources.vfs {
        let vfs_record = encode_record(ResourceKind::Vfs, vfs)?;
        out = engine.insert_or_replace(&out, ResourceKind::Vfs, &vfs_record)?;
    }
    Ok(out)
}

fn transform_stub(
    bin: &[u8],
    engine: Engine,
    resources: &ResolvedResources,
    stub_src: &Path,
    scratch: &Path,
    collab: &dyn Collaborator,
    depth: usize,
) -> Result<Vec<u8>> {
    tracing::debug!(depth, "compressed stub detected, entering bridge");
    let payload = engine.extract(bin, ResourceKind::SmolCompressed)?;
    let stub = split_stub_payload(&payload)?;

    check_cancelled()?;
    let inner = decompress_inner(&stub, scratch, collab)?;
    if inner.len() as u64 > MAX_INPUT_SIZE {
        return Err(InjectError::SizeLimitExceeded {
            what: "stub inner executable".into(),
            actual: inner.len() as u64,
            limit: MAX_INPUT_SIZE,
        });
    }
    let inner_engine = Engine::for_format(detect_format(&inner))
        .ok_or_else(|| InjectError::MalformedBinary("stub inner is not an executable".into()))?;

    let new_inner = transform(
        &inner,
        inner_engine,
        resources,
        false,
        stub_src,
        scratch,
        collab,
        depth + 1,
    )?;

    check_cancelled()?;
    let new_image = compress_inner(&new_inner, stub_src, scratch, collab)?;

    let aux_record = match &resources.update {
        Some(update) => serialize_update_config(update).to_vec(),
        None => stub.aux_record.clone(),
    };
    let new_payload =
        build_stub_payload(&aux_record, new_inner.len() as u64, stub.algo, &new_image);
    let record = encode_record(ResourceKind::SmolCompressed, &new_payload)?;

    let (stripped, _) = sign::strip_if_signed(engine.format(), bin.to_vec())?;
    engine.insert_or_replace(&stripped, ResourceKind::SmolCompressed, &record)
}

/// Turn the `--sea`/`--vfs` arguments into payload bytes, generating the
/// SEA blob when the argument is a JSON config.
fn resolve_resources(
    sea_path: &Path,
    opts: &InjectOptions,
    collab: &dyn Collaborator,
) -> Result<ResolvedResources> {
    let sea_bytes = read_input(sea_path)?;

    let (sea, update) = if looks_like_config(sea_path, &sea_bytes) {
        let base_dir = sea_path.parent().unwrap_or_else(|| Path::new("."));
        let mut config = parse_sea_config(&sea_bytes, base_dir)?;
        if let Some(mode) = opts.vfs_mode {
            if let Some(vfs) = &mut config.vfs {
                vfs.mode = mode;
            }
        }

        check_cancelled()?;
        let blob = generate_sea_blob(&config, sea_path, collab)?;

        // The VFS sub-config record travels next to the blob so the
        // external archiver and stub runtime can pick it up.
        if let Some(vfs) = &config.vfs {
            let record_path = base_dir.join(&config.output).with_extension("vfs");
            std::fs::write(&record_path, serialize_vfs_config(vfs))?;
            tracing::debug!(record = %record_path.display(), "wrote VFS sub-config record");
        }

        (blob, Some(config.update))
    } else {
        (sea_bytes, None)
    };

    let vfs = match &opts.vfs {
        Some(path) => Some(read_input(path)?),
        None => None,
    };

    Ok(ResolvedResources { sea, vfs, update })
}

// ── list / extract / verify ──────────────────────────────────────────────────

/// Report every injected resource in `input`.
pub fn list(input: &Path) -> Result<Vec<ResourceSummary>> {
    let bin = read_input(input)?;
    let engine = Engine::for_format(detect_format(&bin)).ok_or(InjectError::UnsupportedFormat)?;
    engine.list(&bin)
}

/// Extract `kind`'s payload from `input` into `output`.
pub fn extract(input: &Path, kind: ResourceKind, output: &Path) -> Result<u64> {
    let payload = verify(input, kind)?;
    write_output(output, &payload, false)?;
    Ok(payload.len() as u64)
}

/// Decode and CRC-check `kind`'s payload without writing anything.
pub fn verify(input: &Path, kind: ResourceKind) -> Result<Vec<u8>> {
    let bin = read_input(input)?;
    let engine = Engine::for_format(detect_format(&bin)).ok_or(InjectError::UnsupportedFormat)?;
    engine.extract(&bin, kind)
}

// ── I/O helpers ──────────────────────────────────────────────────────────────

fn read_input(path: &Path) -> Result<Vec<u8>> {
    let meta = std::fs::metadata(path)
        .map_err(|_| InjectError::FileNotFound(path.to_owned()))?;
    if meta.len() > MAX_INPUT_SIZE {
        return Err(InjectError::SizeLimitExceeded {
            what: format!("input file {}", path.display()),
            actual: meta.len(),
            limit: MAX_INPUT_SIZE,
        });
    }
    std::fs::read(path).map_err(InjectError::Io)
}

/// Write `bytes` to `path` atomically: temp file in the destination
/// directory, then rename.  Injected binaries are marked executable.
fn write_output(path: &Path, bytes: &[u8], executable: bool) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    let file = tmp.persist(path).map_err(|e| InjectError::Io(e.error))?;
    #[cfg(unix)]
    if executable {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o755))?;
    }
    drop(file);
    Ok(())
}
