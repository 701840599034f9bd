//! Mach-O engine: thin (32/64-bit, either endianness) and universal (fat)
//! binaries.
//!
//! # Strategy
//!
//! Injected data always lands **past the original end of file**, so no
//! existing file offset in any load command has to be rewritten.  A resource
//! lives in its own segment with exactly one section:
//!
//! - replace: point the existing section at a fresh region appended at EOF
//!   (4-byte aligned), truncating the old region first when it sits at EOF
//!   so repeated replacement does not grow the file without bound;
//! - add: append a new `LC_SEGMENT`/`LC_SEGMENT_64` load command in the
//!   slack between the end of the load commands and the first section's
//!   data.  If the slack cannot hold it, the only fix is rebuilding the
//!   input, so that is `InsufficientHeaderSlack`.
//!
//! Fat binaries are processed slice by slice and re-aggregated with each
//! slice re-aligned to its declared `2^align` boundary.
//!
//! # Alignment
//! Section file offsets are 4-byte aligned, segment vmsize 16-byte aligned,
//! new segment vmaddr placed past every existing segment on a 16 KiB
//! boundary.

use crate::endian::{align_up, slice, to_u32, to_usize, Endian};
use crate::error::{InjectError, Result};
use crate::resource::ResourceKind;

// ── Magic numbers & load command types ───────────────────────────────────────

const MH_MAGIC: u32 = 0xFEED_FACE;
const MH_MAGIC_64: u32 = 0xFEED_FACF;
const MH_CIGAM: u32 = 0xCEFA_EDFE;
const MH_CIGAM_64: u32 = 0xCFFA_EDFE;
const FAT_MAGIC: u32 = 0xCAFE_BABE;
const FAT_CIGAM: u32 = 0xBEBA_FECA;

const LC_SEGMENT: u32 = 0x1;
const LC_SEGMENT_64: u32 = 0x19;
const LC_CODE_SIGNATURE: u32 = 0x1D;

const VM_PROT_READ: u32 = 0x1;

/// New segments are placed past every existing one on this boundary.
const SEGMENT_VM_ALIGN: u64 = 0x4000;

fn header_size(is64: bool) -> usize {
    if is64 {
        32
    } else {
        28
    }
}

fn segment_cmd_size(is64: bool) -> usize {
    if is64 {
        72
    } else {
        56
    }
}

fn section_size(is64: bool) -> usize {
    if is64 {
        80
    } else {
        68
    }
}

// ── Thin header ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct MachHeader {
    endian: Endian,
    is64: bool,
    ncmds: u32,
    sizeofcmds: u32,
}

impl MachHeader {
    fn parse(bin: &[u8]) -> Result<Self> {
        let magic_bytes = slice(bin, 0, 4)?;
        let raw = u32::from_le_bytes(magic_bytes.try_into().unwrap());
        let (endian, is64) = match raw {
            MH_MAGIC => (Endian::Little, false),
            MH_MAGIC_64 => (Endian::Little, true),
            MH_CIGAM => (Endian::Big, false),
            MH_CIGAM_64 => (Endian::Big, true),
            _ => {
                return Err(InjectError::MalformedBinary(format!(
                    "not a thin Mach-O (magic {raw:#010x})"
                )))
            }
        };
        let ncmds = endian.read_u32(bin, 16)?;
        let sizeofcmds = endian.read_u32(bin, 20)?;
        let lc_end = header_size(is64) as u64 + sizeofcmds as u64;
        if lc_end > bin.len() as u64 {
            return Err(InjectError::MalformedBinary(format!(
                "load commands end at {lc_end}, past the {}-byte file",
                bin.len()
            )));
        }
        Ok(Self {
            endian,
            is64,
            ncmds,
            sizeofcmds,
        })
    }

    fn lc_start(&self) -> usize {
        header_size(self.is64)
    }

    fn lc_end(&self) -> usize {
        self.lc_start() + self.sizeofcmds as usize
    }

    /// Patch `ncmds`/`sizeofcmds` back into the header bytes.
    fn store_counts(&self, bin: &mut [u8]) -> Result<()> {
        self.endian.write_u32(bin, 16, self.ncmds)?;
        self.endian.write_u32(bin, 20, self.sizeofcmds)
    }
}

// ── Load command walk ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct LoadCommand {
    offset: usize,
    cmd: u32,
    cmdsize: u32,
}

fn load_commands(bin: &[u8], h: &MachHeader) -> Result<Vec<LoadCommand>> {
    let mut cmds = Vec::with_capacity(h.ncmds as usize);
    let mut off = h.lc_start();
    let end = h.lc_end();
    for i in 0..h.ncmds {
        let cmd = h.endian.read_u32(bin, off)?;
        let cmdsize = h.endian.read_u32(bin, off + 4)?;
        if cmdsize < 8 || cmdsize % 4 != 0 {
            return Err(InjectError::MalformedBinary(format!(
                "load command {i} has cmdsize {cmdsize}"
            )));
        }
        let next = off
            .checked_add(cmdsize as usize)
            .filter(|n| *n <= end)
            .ok_or_else(|| {
                InjectError::MalformedBinary(format!(
                    "load command {i} overruns the load command area"
                ))
            })?;
        cmds.push(LoadCommand {
            offset: off,
            cmd,
            cmdsize,
        });
        off = next;
    }
    Ok(cmds)
}

fn is_segment(lc: &LoadCommand) -> bool {
    lc.cmd == LC_SEGMENT || lc.cmd == LC_SEGMENT_64
}

// ── Fixed-width name fields ──────────────────────────────────────────────────

fn read_name16(bin: &[u8], off: usize) -> Result<String> {
    let raw = slice(bin, off, 16)?;
    let len = raw.iter().position(|&b| b == 0).unwrap_or(16);
    Ok(String::from_utf8_lossy(&raw[..len]).into_owned())
}

fn write_name16(buf: &mut [u8], off: usize, name: &str) {
    debug_assert!(name.len() <= 16);
    buf[off..off + 16].fill(0);
    buf[off..off + name.len()].copy_from_slice(name.as_bytes());
}

// ── Segment / section views ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Segment {
    lc: LoadCommand,
    is64: bool,
    name: String,
    vmaddr: u64,
    vmsize: u64,
    nsects: u32,
}

fn read_segment(bin: &[u8], h: &MachHeader, lc: LoadCommand) -> Result<Segment> {
    let is64 = lc.cmd == LC_SEGMENT_64;
    let e = h.endian;
    let o = lc.offset;
    let (vmaddr, vmsize, nsects) = if is64 {
        (
            e.read_u64(bin, o + 24)?,
            e.read_u64(bin, o + 32)?,
            e.read_u32(bin, o + 64)?,
        )
    } else {
        (
            e.read_u32(bin, o + 24)? as u64,
            e.read_u32(bin, o + 28)? as u64,
            e.read_u32(bin, o + 48)?,
        )
    };
    let expected = segment_cmd_size(is64) + nsects as usize * section_size(is64);
    if (lc.cmdsize as usize) < expected {
        return Err(InjectError::MalformedBinary(format!(
            "segment command at {o} declares {nsects} sections but cmdsize is {}",
            lc.cmdsize
        )));
    }
    Ok(Segment {
        lc,
        is64,
        name: read_name16(bin, o + 8)?,
        vmaddr,
        vmsize,
        nsects,
    })
}

#[derive(Debug, Clone)]
struct Section {
    /// File offset of this section header within the load command area.
    header_off: usize,
    name: String,
    size: u64,
    fileoff: u32,
}

fn read_sections(bin: &[u8], h: &MachHeader, seg: &Segment) -> Result<Vec<Section>> {
    let e = h.endian;
    let mut out = Vec::with_capacity(seg.nsects as usize);
    let base = seg.lc.offset + segment_cmd_size(seg.is64);
    for i in 0..seg.nsects as usize {
        let o = base + i * section_size(seg.is64);
        let (size, fileoff) = if seg.is64 {
            (e.read_u64(bin, o + 40)?, e.read_u32(bin, o + 48)?)
        } else {
            (e.read_u32(bin, o + 36)? as u64, e.read_u32(bin, o + 40)?)
        };
        out.push(Section {
            header_off: o,
            name: read_name16(bin, o)?,
            size,
            fileoff,
        });
    }
    Ok(out)
}

/// Lowest file offset of any section's data — the hard ceiling for growing
/// the load command area.
fn min_section_offset(bin: &[u8], h: &MachHeader, lcs: &[LoadCommand]) -> Result<u64> {
    let mut min = bin.len() as u64;
    for lc in lcs.iter().filter(|lc| is_segment(lc)) {
        let seg = read_segment(bin, h, *lc)?;
        for sect in read_sections(bin, h, &seg)? {
            if sect.fileoff != 0 && (sect.fileoff as u64) < min {
                min = sect.fileoff as u64;
            }
        }
    }
    Ok(min)
}

/// First vm address past every existing segment, on a 16 KiB boundary.
fn next_vmaddr(bin: &[u8], h: &MachHeader, lcs: &[LoadCommand], skip: Option<usize>) -> Result<u64> {
    let mut max_end = 0u64;
    for lc in lcs.iter().filter(|lc| is_segment(lc)) {
        if skip == Some(lc.offset) {
            continue;
        }
        let seg = read_segment(bin, h, *lc)?;
        let end = seg.vmaddr.checked_add(seg.vmsize).ok_or_else(|| {
            InjectError::MalformedBinary(format!("segment {} vm range overflows", seg.name))
        })?;
        max_end = max_end.max(end);
    }
    Ok(align_up(max_end, SEGMENT_VM_ALIGN))
}

fn find_kind_segment(
    bin: &[u8],
    h: &MachHeader,
    lcs: &[LoadCommand],
    kind: ResourceKind,
) -> Result<Option<(Segment, Section)>> {
    for lc in lcs.iter().filter(|lc| is_segment(lc)) {
        let seg = read_segment(bin, h, *lc)?;
        if seg.name != kind.macho_segment() {
            continue;
        }
        let sect = read_sections(bin, h, &seg)?
            .into_iter()
            .find(|s| s.name == kind.macho_section())
            .ok_or_else(|| {
                InjectError::MalformedBinary(format!(
                    "segment {} lacks its {} section",
                    seg.name,
                    kind.macho_section()
                ))
            })?;
        return Ok(Some((seg, sect)));
    }
    Ok(None)
}

// ── Fat (universal) wrapper ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct FatArch {
    cputype: u32,
    cpusubtype: u32,
    offset: u64,
    size: u64,
    align: u32,
}

/// Returns the field endianness and arch table when `bin` is a fat binary.
fn parse_fat(bin: &[u8]) -> Result<Option<(Endian, Vec<FatArch>)>> {
    if bin.len() < 8 {
        return Err(InjectError::MalformedBinary("file shorter than 8 bytes".into()));
    }
    let raw = u32::from_be_bytes(bin[0..4].try_into().unwrap());
    let endian = match raw {
        FAT_MAGIC => Endian::Big,
        FAT_CIGAM => Endian::Little,
        _ => return Ok(None),
    };
    let nfat = endian.read_u32(bin, 4)?;
    if nfat == 0 || nfat > 64 {
        return Err(InjectError::MalformedBinary(format!(
            "fat binary declares {nfat} architectures"
        )));
    }
    let mut archs = Vec::with_capacity(nfat as usize);
    for i in 0..nfat as usize {
        let o = 8 + i * 20;
        let offset = endian.read_u32(bin, o + 8)? as u64;
        let size = endian.read_u32(bin, o + 12)? as u64;
        let align = endian.read_u32(bin, o + 16)?;
        if align > 30 {
            return Err(InjectError::MalformedBinary(format!(
                "fat arch {i} declares 2^{align} alignment"
            )));
        }
        if offset + size > bin.len() as u64 {
            return Err(InjectError::MalformedBinary(format!(
                "fat arch {i} slice {offset}+{size} lies outside the file"
            )));
        }
        archs.push(FatArch {
            cputype: endian.read_u32(bin, o)?,
            cpusubtype: endian.read_u32(bin, o + 4)?,
            offset,
            size,
            align,
        });
    }
    Ok(Some((endian, archs)))
}

/// Apply `f` to every thin slice and re-aggregate, re-aligning each slice.
/// Thin inputs pass straight through `f`.
fn map_slices<F>(bin: &[u8], f: F) -> Result<Vec<u8>>
where
    F: Fn(&[u8]) -> Result<Vec<u8>>,
{
    let Some((endian, archs)) = parse_fat(bin)? else {
        return f(bin);
    };

    let mut new_slices = Vec::with_capacity(archs.len());
    for arch in &archs {
        let start = to_usize(arch.offset, "fat slice offset")?;
        let len = to_usize(arch.size, "fat slice size")?;
        new_slices.push(f(slice(bin, start, len)?)?);
    }

    let table_end = 8 + archs.len() * 20;
    let mut out = vec![0u8; table_end];
    out[0..4].copy_from_slice(&bin[0..4]);
    endian.write_u32(&mut out, 4, archs.len() as u32)?;

    for (i, (arch, bytes)) in archs.iter().zip(&new_slices).enumerate() {
        let off = align_up(out.len() as u64, 1u64 << arch.align);
        out.resize(to_usize(off, "fat slice offset")?, 0);
        out.extend_from_slice(bytes);

        let o = 8 + i * 20;
        endian.write_u32(&mut out, o, arch.cputype)?;
        endian.write_u32(&mut out, o + 4, arch.cpusubtype)?;
        endian.write_u32(&mut out, o + 8, to_u32(off, "fat slice offset")?)?;
        endian.write_u32(&mut out, o + 12, to_u32(bytes.len() as u64, "fat slice size")?)?;
        endian.write_u32(&mut out, o + 16, arch.align)?;
    }
    Ok(out)
}

// ── Public engine surface ────────────────────────────────────────────────────

/// Locate the container region for `kind`.  For fat binaries the first
/// slice is consulted and the returned offset is absolute within the file.
pub(crate) fn find_region(bin: &[u8], kind: ResourceKind) -> Result<Option<(u64, u64)>> {
    if let Some((_, archs)) = parse_fat(bin)? {
        let arch = archs[0];
        let start = to_usize(arch.offset, "fat slice offset")?;
        let thin = slice(bin, start, to_usize(arch.size, "fat slice size")?)?;
        return Ok(find_region_thin(thin, kind)?
            .map(|(off, size)| (arch.offset + off, size)));
    }
    find_region_thin(bin, kind)
}

fn find_region_thin(bin: &[u8], kind: ResourceKind) -> Result<Option<(u64, u64)>> {
    let h = MachHeader::parse(bin)?;
    let lcs = load_commands(bin, &h)?;
    match find_kind_segment(bin, &h, &lcs, kind)? {
        None => Ok(None),
        Some((_, sect)) => {
            let end = sect.fileoff as u64 + sect.size;
            if end > bin.len() as u64 {
                return Err(InjectError::MalformedBinary(format!(
                    "section {} region {}+{} lies outside the file",
                    sect.name, sect.fileoff, sect.size
                )));
            }
            Ok(Some((sect.fileoff as u64, sect.size)))
        }
    }
}

/// Add or replace the container for `kind`, holding `record` bytes.
pub(crate) fn insert_or_replace(bin: &[u8], kind: ResourceKind, record: &[u8]) -> Result<Vec<u8>> {
    map_slices(bin, |thin| insert_thin(thin, kind, record))
}

fn insert_thin(bin: &[u8], kind: ResourceKind, record: &[u8]) -> Result<Vec<u8>> {
    let mut h = MachHeader::parse(bin)?;
    let lcs = load_commands(bin, &h)?;
    let filesize = record.len() as u64;
    let vmsize = align_up(filesize, 16);

    if let Some((seg, sect)) = find_kind_segment(bin, &h, &lcs, kind)? {
        // Replace: retarget the existing section at a fresh tail region.
        let mut out = bin.to_vec();
        let old_end = sect.fileoff as u64 + sect.size;
        if old_end == out.len() as u64 {
            out.truncate(sect.fileoff as usize);
        }
        let fileoff = align_up(out.len() as u64, 4);
        out.resize(to_usize(fileoff, "section file offset")?, 0);
        out.extend_from_slice(record);

        let vmaddr = next_vmaddr(bin, &h, &lcs, Some(seg.lc.offset))?;
        patch_segment(&mut out, &h, &seg, vmaddr, vmsize, fileoff, filesize)?;
        patch_section(&mut out, &h, &seg, &sect, vmaddr, filesize, fileoff)?;
        return Ok(out);
    }

    // Add: a new segment load command with exactly one section.
    let new_cmdsize = segment_cmd_size(h.is64) + section_size(h.is64);
    let slack_end = min_section_offset(bin, &h, &lcs)?;
    if h.lc_end() as u64 + new_cmdsize as u64 > slack_end {
        return Err(InjectError::InsufficientHeaderSlack(format!(
            "need {new_cmdsize} bytes for a new segment load command, {} available",
            slack_end.saturating_sub(h.lc_end() as u64)
        )));
    }

    let mut out = bin.to_vec();
    let fileoff = align_up(out.len() as u64, 4);
    out.resize(to_usize(fileoff, "section file offset")?, 0);
    out.extend_from_slice(record);

    let vmaddr = next_vmaddr(bin, &h, &lcs, None)?;
    let cmd = build_segment_command(&h, kind, vmaddr, vmsize, fileoff, filesize)?;
    let insert_at = h.lc_end();
    out[insert_at..insert_at + cmd.len()].copy_from_slice(&cmd);

    h.ncmds += 1;
    h.sizeofcmds += new_cmdsize as u32;
    h.store_counts(&mut out)?;
    Ok(out)
}

fn patch_segment(
    out: &mut [u8],
    h: &MachHeader,
    seg: &Segment,
    vmaddr: u64,
    vmsize: u64,
    fileoff: u64,
    filesize: u64,
) -> Result<()> {
    let e = h.endian;
    let o = seg.lc.offset;
    if seg.is64 {
        e.write_u64(out, o + 24, vmaddr)?;
        e.write_u64(out, o + 32, vmsize)?;
        e.write_u64(out, o + 40, fileoff)?;
        e.write_u64(out, o + 48, filesize)?;
    } else {
        e.write_u32(out, o + 24, to_u32(vmaddr, "vmaddr")?)?;
        e.write_u32(out, o + 28, to_u32(vmsize, "vmsize")?)?;
        e.write_u32(out, o + 32, to_u32(fileoff, "fileoff")?)?;
        e.write_u32(out, o + 36, to_u32(filesize, "filesize")?)?;
    }
    Ok(())
}

fn patch_section(
    out: &mut [u8],
    h: &MachHeader,
    seg: &Segment,
    sect: &Section,
    addr: u64,
    size: u64,
    fileoff: u64,
) -> Result<()> {
    let e = h.endian;
    let o = sect.header_off;
    if seg.is64 {
        e.write_u64(out, o + 32, addr)?;
        e.write_u64(out, o + 40, size)?;
        e.write_u32(out, o + 48, to_u32(fileoff, "section offset")?)?;
    } else {
        e.write_u32(out, o + 32, to_u32(addr, "section addr")?)?;
        e.write_u32(out, o + 36, to_u32(size, "section size")?)?;
        e.write_u32(out, o + 40, to_u32(fileoff, "section offset")?)?;
    }
    Ok(())
}

/// Serialize a complete segment load command (one section) in the file's
/// endianness and width.
fn build_segment_command(
    h: &MachHeader,
    kind: ResourceKind,
    vmaddr: u64,
    vmsize: u64,
    fileoff: u64,
    filesize: u64,
) -> Result<Vec<u8>> {
    let e = h.endian;
    let seg_size = segment_cmd_size(h.is64);
    let total = seg_size + section_size(h.is64);
    let mut buf = vec![0u8; total];

    if h.is64 {
        e.write_u32(&mut buf, 0, LC_SEGMENT_64)?;
        e.write_u32(&mut buf, 4, total as u32)?;
        write_name16(&mut buf, 8, kind.macho_segment());
        e.write_u64(&mut buf, 24, vmaddr)?;
        e.write_u64(&mut buf, 32, vmsize)?;
        e.write_u64(&mut buf, 40, fileoff)?;
        e.write_u64(&mut buf, 48, filesize)?;
        e.write_u32(&mut buf, 56, VM_PROT_READ)?; // maxprot
        e.write_u32(&mut buf, 60, VM_PROT_READ)?; // initprot
        e.write_u32(&mut buf, 64, 1)?; // nsects
        // section_64
        let s = seg_size;
        write_name16(&mut buf, s, kind.macho_section());
        write_name16(&mut buf, s + 16, kind.macho_segment());
        e.write_u64(&mut buf, s + 32, vmaddr)?;
        e.write_u64(&mut buf, s + 40, filesize)?;
        e.write_u32(&mut buf, s + 48, to_u32(fileoff, "section offset")?)?;
        e.write_u32(&mut buf, s + 52, 2)?; // align = 2^2
    } else {
        e.write_u32(&mut buf, 0, LC_SEGMENT)?;
        e.write_u32(&mut buf, 4, total as u32)?;
        write_name16(&mut buf, 8, kind.macho_segment());
        e.write_u32(&mut buf, 24, to_u32(vmaddr, "vmaddr")?)?;
        e.write_u32(&mut buf, 28, to_u32(vmsize, "vmsize")?)?;
        e.write_u32(&mut buf, 32, to_u32(fileoff, "fileoff")?)?;
        e.write_u32(&mut buf, 36, to_u32(filesize, "filesize")?)?;
        e.write_u32(&mut buf, 40, VM_PROT_READ)?;
        e.write_u32(&mut buf, 44, VM_PROT_READ)?;
        e.write_u32(&mut buf, 48, 1)?; // nsects
        let s = seg_size;
        write_name16(&mut buf, s, kind.macho_section());
        write_name16(&mut buf, s + 16, kind.macho_segment());
        e.write_u32(&mut buf, s + 32, to_u32(vmaddr, "section addr")?)?;
        e.write_u32(&mut buf, s + 36, to_u32(filesize, "section size")?)?;
        e.write_u32(&mut buf, s + 40, to_u32(fileoff, "section offset")?)?;
        e.write_u32(&mut buf, s + 44, 2)?;
    }
    Ok(buf)
}

/// Remove `kind`'s container.  `NotFound` if absent.
pub(crate) fn remove(bin: &[u8], kind: ResourceKind) -> Result<Vec<u8>> {
    map_slices(bin, |thin| remove_thin(thin, kind))
}

fn remove_thin(bin: &[u8], kind: ResourceKind) -> Result<Vec<u8>> {
    let mut h = MachHeader::parse(bin)?;
    let lcs = load_commands(bin, &h)?;
    let Some((seg, sect)) = find_kind_segment(bin, &h, &lcs, kind)? else {
        return Err(InjectError::NotFound(kind));
    };

    let mut out = bin.to_vec();
    let region_end = sect.fileoff as u64 + sect.size;
    if region_end == out.len() as u64 {
        out.truncate(sect.fileoff as usize);
    }
    remove_load_command(&mut out, &mut h, seg.lc)?;
    Ok(out)
}

/// Splice one load command out of the command area, zeroing the freed tail.
fn remove_load_command(out: &mut [u8], h: &mut MachHeader, lc: LoadCommand) -> Result<()> {
    let lc_end = h.lc_end();
    let cmdsize = lc.cmdsize as usize;
    out.copy_within(lc.offset + cmdsize..lc_end, lc.offset);
    out[lc_end - cmdsize..lc_end].fill(0);
    h.ncmds -= 1;
    h.sizeofcmds -= lc.cmdsize;
    h.store_counts(out)
}

// ── Code signature handling (used by the signature manager) ─────────────────

/// Strip `LC_CODE_SIGNATURE` from every slice that carries one.
/// Returns `None` when no slice is signed (the input is reused as-is).
pub(crate) fn strip_code_signature(bin: &[u8]) -> Result<Option<Vec<u8>>> {
    if !has_code_signature(bin)? {
        return Ok(None);
    }
    map_slices(bin, |thin| match strip_signature_thin(thin)? {
        Some(stripped) => Ok(stripped),
        None => Ok(thin.to_vec()),
    })
    .map(Some)
}

pub(crate) fn has_code_signature(bin: &[u8]) -> Result<bool> {
    if let Some((_, archs)) = parse_fat(bin)? {
        for arch in archs {
            let start = to_usize(arch.offset, "fat slice offset")?;
            let thin = slice(bin, start, to_usize(arch.size, "fat slice size")?)?;
            if has_signature_thin(thin)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    has_signature_thin(bin)
}

fn has_signature_thin(bin: &[u8]) -> Result<bool> {
    let h = MachHeader::parse(bin)?;
    Ok(load_commands(bin, &h)?
        .iter()
        .any(|lc| lc.cmd == LC_CODE_SIGNATURE))
}

fn strip_signature_thin(bin: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut h = MachHeader::parse(bin)?;
    let lcs = load_commands(bin, &h)?;
    let Some(lc) = lcs.iter().find(|lc| lc.cmd == LC_CODE_SIGNATURE).copied() else {
        return Ok(None);
    };
    let dataoff = h.endian.read_u32(bin, lc.offset + 8)? as u64;
    let datasize = h.endian.read_u32(bin, lc.offset + 12)? as u64;

    let mut out = bin.to_vec();
    if dataoff + datasize == out.len() as u64 {
        out.truncate(to_usize(dataoff, "signature offset")?);
    }
    remove_load_command(&mut out, &mut h, lc)?;
    Ok(Some(out))
}
