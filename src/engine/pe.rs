//! PE engine: PE32 and PE32+ via the resource directory.
//!
//! # Strategy
//!
//! Every resource kind is a named RCDATA entry (`type 10 / name / lang 0`)
//! in the resource tree.  Mutation rebuilds the whole tree — foreign
//! resources (icons, manifests, version info) are parsed and re-emitted
//! verbatim — and serializes it as a fresh `.rsrc` section past the
//! original end of file:
//!
//! - the section lands at `align(SizeOfImage, SectionAlignment)` in the
//!   image and `align(EOF, FileAlignment)` in the file;
//! - an existing `.rsrc` header is moved to the end of the section table so
//!   virtual addresses stay ascending; otherwise the table grows by one
//!   entry, which must fit under `SizeOfHeaders` or the operation fails
//!   with `InsufficientHeaderSlack`;
//! - the data directory entry, `SizeOfImage`, and the header checksum are
//!   recomputed.  An Authenticode signature (data directory 4) is stripped
//!   and not recreated.
//!
//! All PE header fields are little-endian regardless of host.

use crate::endian::{align_up, slice, to_u32, to_usize, Endian};
use crate::error::{InjectError, Result};
use crate::resource::{ResourceKind, PE_RESOURCE_TYPE};

const E: Endian = Endian::Little;

const OPT_MAGIC_PE32: u16 = 0x10B;
const OPT_MAGIC_PE32_PLUS: u16 = 0x20B;

const SECTION_HEADER_SIZE: usize = 40;
const DATA_DIR_RESOURCE: usize = 2;
const DATA_DIR_SECURITY: usize = 4;

const RSRC_NAME: [u8; 8] = *b".rsrc\0\0\0";
/// IMAGE_SCN_CNT_INITIALIZED_DATA | IMAGE_SCN_MEM_READ
const RSRC_CHARACTERISTICS: u32 = 0x4000_0040;

const MAX_RES_DEPTH: usize = 8;

// ── Header view ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct PeSection {
    header_off: usize,
    name: [u8; 8],
    virtual_size: u32,
    virtual_address: u32,
    size_of_raw: u32,
    ptr_raw: u32,
}

#[derive(Debug, Clone)]
struct PeView {
    coff_off: usize,
    num_sections: u16,
    opt_off: usize,
    file_alignment: u32,
    section_alignment: u32,
    size_of_image: u32,
    size_of_headers: u32,
    checksum_off: usize,
    num_data_dirs: u32,
    data_dir_off: usize,
    sect_table_off: usize,
    sections: Vec<PeSection>,
}

impl PeView {
    fn parse(bin: &[u8]) -> Result<Self> {
        if slice(bin, 0, 2)? != b"MZ" {
            return Err(InjectError::MalformedBinary("missing MZ header".into()));
        }
        let e_lfanew = E.read_u32(bin, 0x3C)? as usize;
        if slice(bin, e_lfanew, 4)? != b"PE\0\0" {
            return Err(InjectError::MalformedBinary("missing PE signature".into()));
        }
        let coff_off = e_lfanew + 4;
        let num_sections = E.read_u16(bin, coff_off + 2)?;
        let opt_size = E.read_u16(bin, coff_off + 16)? as usize;
        let opt_off = coff_off + 20;
        slice(bin, opt_off, opt_size)?;

        let magic = E.read_u16(bin, opt_off)?;
        let is_plus = match magic {
            OPT_MAGIC_PE32 => false,
            OPT_MAGIC_PE32_PLUS => true,
            _ => {
                return Err(InjectError::MalformedBinary(format!(
                    "unknown optional header magic {magic:#06x}"
                )))
            }
        };

        let num_dirs_off = opt_off + if is_plus { 108 } else { 92 };
        let num_data_dirs = E.read_u32(bin, num_dirs_off)?;
        let data_dir_off = num_dirs_off + 4;
        let sect_table_off = opt_off + opt_size;

        let mut sections = Vec::with_capacity(num_sections as usize);
        for i in 0..num_sections as usize {
            let o = sect_table_off + i * SECTION_HEADER_SIZE;
            let name: [u8; 8] = slice(bin, o, 8)?.try_into().unwrap();
            sections.push(PeSection {
                header_off: o,
                name,
                virtual_size: E.read_u32(bin, o + 8)?,
                virtual_address: E.read_u32(bin, o + 12)?,
                size_of_raw: E.read_u32(bin, o + 16)?,
                ptr_raw: E.read_u32(bin, o + 20)?,
            });
        }

        Ok(Self {
            coff_off,
            num_sections,
            opt_off,
            file_alignment: E.read_u32(bin, opt_off + 36)?,
            section_alignment: E.read_u32(bin, opt_off + 32)?,
            size_of_image: E.read_u32(bin, opt_off + 56)?,
            size_of_headers: E.read_u32(bin, opt_off + 60)?,
            checksum_off: opt_off + 64,
            num_data_dirs,
            data_dir_off,
            sect_table_off,
            sections,
        })
    }

    fn data_dir(&self, bin: &[u8], index: usize) -> Result<Option<(u32, u32)>> {
        if index as u32 >= self.num_data_dirs {
            return Ok(None);
        }
        let o = self.data_dir_off + index * 8;
        let rva = E.read_u32(bin, o)?;
        let size = E.read_u32(bin, o + 4)?;
        Ok(if rva == 0 && size == 0 {
            None
        } else {
            Some((rva, size))
        })
    }

    fn set_data_dir(&self, bin: &mut [u8], index: usize, rva: u32, size: u32) -> Result<()> {
        let o = self.data_dir_off + index * 8;
        E.write_u32(bin, o, rva)?;
        E.write_u32(bin, o + 4, size)
    }

    fn rva_to_offset(&self, rva: u32) -> Result<usize> {
        for s in &self.sections {
            let span = s.virtual_size.max(s.size_of_raw);
            if rva >= s.virtual_address && rva < s.virtual_address.saturating_add(span) {
                return Ok(s.ptr_raw as usize + (rva - s.virtual_address) as usize);
            }
        }
        if rva < self.size_of_headers {
            return Ok(rva as usize);
        }
        Err(InjectError::MalformedBinary(format!(
            "RVA {rva:#x} maps to no section"
        )))
    }
}

// ── Resource tree model ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum ResName {
    // Ordering matters: named entries sort before ID entries, which is the
    // order the directory tables must be emitted in.
    Name(String),
    Id(u32),
}

#[derive(Debug, Clone)]
enum ResNode {
    Dir(ResDir),
    Data(ResData),
}

#[derive(Debug, Clone)]
struct ResData {
    bytes: Vec<u8>,
    codepage: u32,
}

#[derive(Debug, Clone, Default)]
struct ResDir {
    characteristics: u32,
    timestamp: u32,
    major: u16,
    minor: u16,
    entries: Vec<(ResName, ResNode)>,
}

impl ResDir {
    fn sort(&mut self) {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, node) in &mut self.entries {
            if let ResNode::Dir(d) = node {
                d.sort();
            }
        }
    }

    fn child_dir_mut(&mut self, name: &ResName) -> &mut ResDir {
        let pos = match self.entries.iter().position(|(n, _)| n == name) {
            Some(p) => p,
            None => {
                self.entries
                    .push((name.clone(), ResNode::Dir(ResDir::default())));
                self.entries.len() - 1
            }
        };
        // A data leaf where a directory is expected gets replaced.
        if !matches!(self.entries[pos].1, ResNode::Dir(_)) {
            self.entries[pos].1 = ResNode::Dir(ResDir::default());
        }
        match &mut self.entries[pos].1 {
            ResNode::Dir(d) => d,
            ResNode::Data(_) => unreachable!(),
        }
    }

    fn child(&self, name: &ResName) -> Option<&ResNode> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

fn parse_res_dir(
    bin: &[u8],
    view: &PeView,
    rsrc: &[u8],
    dir_off: usize,
    depth: usize,
) -> Result<ResDir> {
    if depth > MAX_RES_DEPTH {
        return Err(InjectError::MalformedBinary(
            "resource directory nests too deeply".into(),
        ));
    }
    let n_named = E.read_u16(rsrc, dir_off + 12)? as usize;
    let n_id = E.read_u16(rsrc, dir_off + 14)? as usize;
    let mut dir = ResDir {
        characteristics: E.read_u32(rsrc, dir_off)?,
        timestamp: E.read_u32(rsrc, dir_off + 4)?,
        major: E.read_u16(rsrc, dir_off + 8)?,
        minor: E.read_u16(rsrc, dir_off + 10)?,
        entries: Vec::with_capacity(n_named + n_id),
    };
    for i in 0..n_named + n_id {
        let eo = dir_off + 16 + i * 8;
        let name_field = E.read_u32(rsrc, eo)?;
        let child_field = E.read_u32(rsrc, eo + 4)?;

        let name = if name_field & 0x8000_0000 != 0 {
            let so = (name_field & 0x7FFF_FFFF) as usize;
            let count = E.read_u16(rsrc, so)? as usize;
            let mut units = Vec::with_capacity(count);
            for u in 0..count {
                units.push(E.read_u16(rsrc, so + 2 + u * 2)?);
            }
            ResName::Name(String::from_utf16_lossy(&units))
        } else {
            ResName::Id(name_field)
        };

        let node = if child_field & 0x8000_0000 != 0 {
            ResNode::Dir(parse_res_dir(
                bin,
                view,
                rsrc,
                (child_field & 0x7FFF_FFFF) as usize,
                depth + 1,
            )?)
        } else {
            let de = child_field as usize;
            let rva = E.read_u32(rsrc, de)?;
            let size = E.read_u32(rsrc, de + 4)?;
            let codepage = E.read_u32(rsrc, de + 8)?;
            let off = view.rva_to_offset(rva)?;
            ResNode::Data(ResData {
                bytes: slice(bin, off, to_usize(size as u64, "resource size")?)?.to_vec(),
                codepage,
            })
        };
        dir.entries.push((name, node));
    }
    Ok(dir)
}

fn load_res_tree(bin: &[u8], view: &PeView) -> Result<ResDir> {
    let Some((rva, _size)) = view.data_dir(bin, DATA_DIR_RESOURCE)? else {
        return Ok(ResDir::default());
    };
    let base = view.rva_to_offset(rva)?;
    // Directory offsets are relative to the rsrc base; bound them by the
    // rest of the file rather than the declared size, which lies in some
    // real-world binaries.
    let rsrc = slice(bin, base, bin.len() - base)?;
    parse_res_dir(bin, view, rsrc, 0, 0)
}

// ── Resource tree serialization ──────────────────────────────────────────────

#[derive(Default)]
struct Layout {
    dir_bytes: u32,
    n_data: u32,
    name_bytes: u32,
}

fn measure(dir: &ResDir, l: &mut Layout) -> Result<()> {
    l.dir_bytes = l
        .dir_bytes
        .checked_add(16 + 8 * dir.entries.len() as u32)
        .ok_or_else(|| InjectError::SizeOverflow("resource directory too large".into()))?;
    for (name, node) in &dir.entries {
        if let ResName::Name(s) = name {
            l.name_bytes += 2 + 2 * s.encode_utf16().count() as u32;
        }
        match node {
            ResNode::Dir(d) => measure(d, l)?,
            ResNode::Data(_) => l.n_data += 1,
        }
    }
    Ok(())
}

struct Cursors {
    dir: u32,
    data: u32,
    name: u32,
}

/// Emit one directory table (entries already sorted) and, depth-first, its
/// children.  Returns the table's offset within the rsrc blob.
fn emit_dir(
    dir: &ResDir,
    buf: &mut Vec<u8>,
    cur: &mut Cursors,
    base_rva: u32,
) -> Result<u32> {
    let my_off = cur.dir;
    cur.dir += 16 + 8 * dir.entries.len() as u32;

    let n_named = dir
        .entries
        .iter()
        .filter(|(n, _)| matches!(n, ResName::Name(_)))
        .count() as u16;
    let n_id = dir.entries.len() as u16 - n_named;

    let o = my_off as usize;
    E.write_u32(buf, o, dir.characteristics)?;
    E.write_u32(buf, o + 4, dir.timestamp)?;
    E.write_u16(buf, o + 8, dir.major)?;
    E.write_u16(buf, o + 10, dir.minor)?;
    E.write_u16(buf, o + 12, n_named)?;
    E.write_u16(buf, o + 14, n_id)?;

    for (i, (name, node)) in dir.entries.iter().enumerate() {
        let eo = o + 16 + i * 8;

        let name_field = match name {
            ResName::Id(id) => *id,
            ResName::Name(s) => {
                let so = cur.name;
                let units: Vec<u16> = s.encode_utf16().collect();
                cur.name += 2 + 2 * units.len() as u32;
                E.write_u16(buf, so as usize, units.len() as u16)?;
                for (u, unit) in units.iter().enumerate() {
                    E.write_u16(buf, so as usize + 2 + u * 2, *unit)?;
                }
                so | 0x8000_0000
            }
        };

        let child_field = match node {
            ResNode::Dir(d) => emit_dir(d, buf, cur, base_rva)? | 0x8000_0000,
            ResNode::Data(d) => {
                let deo = cur.data;
                cur.data += 16;
                let payload_off = align_up(buf.len() as u64, 8);
                buf.resize(to_usize(payload_off, "resource payload offset")?, 0);
                buf.extend_from_slice(&d.bytes);
                let rva = base_rva
                    .checked_add(to_u32(payload_off, "resource payload offset")?)
                    .ok_or_else(|| InjectError::SizeOverflow("resource RVA".into()))?;
                E.write_u32(buf, deo as usize, rva)?;
                E.write_u32(buf, deo as usize + 4, to_u32(d.bytes.len() as u64, "resource size")?)?;
                E.write_u32(buf, deo as usize + 8, d.codepage)?;
                E.write_u32(buf, deo as usize + 12, 0)?;
                deo
            }
        };

        E.write_u32(buf, eo, name_field)?;
        E.write_u32(buf, eo + 4, child_field)?;
    }
    Ok(my_off)
}

fn serialize_rsrc(root: &ResDir, base_rva: u32) -> Result<Vec<u8>> {
    let mut l = Layout::default();
    measure(root, &mut l)?;
    let data_start = l.dir_bytes;
    let name_start = data_start + 16 * l.n_data;
    let name_end = name_start + l.name_bytes;
    let fixed = align_up(name_end as u64, 8);

    let mut buf = vec![0u8; to_usize(fixed, "rsrc fixed region")?];
    let mut cur = Cursors {
        dir: 0,
        data: data_start,
        name: name_start,
    };
    emit_dir(root, &mut buf, &mut cur, base_rva)?;
    Ok(buf)
}

// ── Public engine surface ────────────────────────────────────────────────────

fn kind_entry<'t>(tree: &'t ResDir, kind: ResourceKind) -> Option<&'t ResData> {
    let ResNode::Dir(types) = tree.child(&ResName::Id(PE_RESOURCE_TYPE))? else {
        return None;
    };
    let ResNode::Dir(langs) =
        types.child(&ResName::Name(kind.pe_resource_name().to_owned()))?
    else {
        return None;
    };
    match langs.child(&ResName::Id(0))? {
        ResNode::Data(d) => Some(d),
        ResNode::Dir(_) => None,
    }
}

pub(crate) fn find_region(bin: &[u8], kind: ResourceKind) -> Result<Option<(u64, u64)>> {
    let view = PeView::parse(bin)?;
    let Some((rva, _)) = view.data_dir(bin, DATA_DIR_RESOURCE)? else {
        return Ok(None);
    };
    let base = view.rva_to_offset(rva)?;
    let rsrc = slice(bin, base, bin.len() - base)?;
    // Walk without copying payloads: type dir → name dir → lang 0 data.
    let Some(de) = find_data_entry(rsrc, kind)? else {
        return Ok(None);
    };
    let data_rva = E.read_u32(rsrc, de)?;
    let size = E.read_u32(rsrc, de + 4)?;
    let off = view.rva_to_offset(data_rva)? as u64;
    if off + size as u64 > bin.len() as u64 {
        return Err(InjectError::MalformedBinary(format!(
            "resource {} region {off}+{size} lies outside the file",
            kind.pe_resource_name()
        )));
    }
    Ok(Some((off, size as u64)))
}

/// Offset of the `(type 10, name, lang 0)` data-entry descriptor within the
/// rsrc blob, if present.
fn find_data_entry(rsrc: &[u8], kind: ResourceKind) -> Result<Option<usize>> {
    let Some(type_dir) = find_child_dir(rsrc, 0, |nf| nf == PE_RESOURCE_TYPE)? else {
        return Ok(None);
    };
    let want = kind.pe_resource_name();
    let Some(name_dir) = find_child_dir(rsrc, type_dir, |nf| {
        name_field_matches(rsrc, nf, want).unwrap_or(false)
    })?
    else {
        return Ok(None);
    };
    // lang 0 (or the sole entry) → data entry
    let n = E.read_u16(rsrc, name_dir + 12)? as usize + E.read_u16(rsrc, name_dir + 14)? as usize;
    for i in 0..n {
        let eo = name_dir + 16 + i * 8;
        let child = E.read_u32(rsrc, eo + 4)?;
        if child & 0x8000_0000 == 0 {
            return Ok(Some(child as usize));
        }
    }
    Ok(None)
}

fn name_field_matches(rsrc: &[u8], name_field: u32, want: &str) -> Result<bool> {
    if name_field & 0x8000_0000 == 0 {
        return Ok(false);
    }
    let so = (name_field & 0x7FFF_FFFF) as usize;
    let count = E.read_u16(rsrc, so)? as usize;
    if count != want.encode_utf16().count() {
        return Ok(false);
    }
    for (u, unit) in want.encode_utf16().enumerate() {
        if E.read_u16(rsrc, so + 2 + u * 2)? != unit {
            return Ok(false);
        }
    }
    Ok(true)
}

fn find_child_dir(
    rsrc: &[u8],
    dir_off: usize,
    mut pred: impl FnMut(u32) -> bool,
) -> Result<Option<usize>> {
    let n = E.read_u16(rsrc, dir_off + 12)? as usize + E.read_u16(rsrc, dir_off + 14)? as usize;
    for i in 0..n {
        let eo = dir_off + 16 + i * 8;
        let name_field = E.read_u32(rsrc, eo)?;
        let child = E.read_u32(rsrc, eo + 4)?;
        if pred(name_field) && child & 0x8000_0000 != 0 {
            return Ok(Some((child & 0x7FFF_FFFF) as usize));
        }
    }
    Ok(None)
}

pub(crate) fn insert_or_replace(bin: &[u8], kind: ResourceKind, record: &[u8]) -> Result<Vec<u8>> {
    let view = PeView::parse(bin)?;
    if (view.num_data_dirs as usize) <= DATA_DIR_RESOURCE {
        return Err(InjectError::InsufficientHeaderSlack(
            "optional header has no resource directory slot".into(),
        ));
    }

    let mut tree = load_res_tree(bin, &view)?;
    let types = tree.child_dir_mut(&ResName::Id(PE_RESOURCE_TYPE));
    let langs = types.child_dir_mut(&ResName::Name(kind.pe_resource_name().to_owned()));
    langs.entries = vec![(
        ResName::Id(0),
        ResNode::Data(ResData {
            bytes: record.to_vec(),
            codepage: 0,
        }),
    )];
    tree.sort();

    rebuild(bin, view, Some(tree))
}

pub(crate) fn remove(bin: &[u8], kind: ResourceKind) -> Result<Vec<u8>> {
    let view = PeView::parse(bin)?;
    let mut tree = load_res_tree(bin, &view)?;
    if kind_entry(&tree, kind).is_none() {
        return Err(InjectError::NotFound(kind));
    }

    let want = ResName::Name(kind.pe_resource_name().to_owned());
    let types = tree.child_dir_mut(&ResName::Id(PE_RESOURCE_TYPE));
    types.entries.retain(|(n, _)| *n != want);
    let type_empty = types.entries.is_empty();
    if type_empty {
        tree.entries
            .retain(|(n, _)| *n != ResName::Id(PE_RESOURCE_TYPE));
    }
    tree.sort();

    let replacement = if tree.entries.is_empty() { None } else { Some(tree) };
    rebuild(bin, view, replacement)
}

/// Write the mutated binary: Authenticode stripped, old `.rsrc` tail
/// reclaimed, new tree serialized at EOF (or dropped entirely when `tree`
/// is `None`), headers and checksum fixed up.
fn rebuild(bin: &[u8], view: PeView, tree: Option<ResDir>) -> Result<Vec<u8>> {
    let mut out = bin.to_vec();

    // Authenticode: data directory 4 holds a FILE OFFSET, not an RVA.
    if let Some((cert_off, cert_size)) = view.data_dir(&out, DATA_DIR_SECURITY)? {
        if cert_off as u64 + cert_size as u64 == out.len() as u64 {
            out.truncate(cert_off as usize);
        }
        view.set_data_dir(&mut out, DATA_DIR_SECURITY, 0, 0)?;
    }

    // Reclaim the old .rsrc raw region when it sits at EOF.
    let old_rsrc = view
        .sections
        .iter()
        .position(|s| s.name == RSRC_NAME)
        .map(|i| view.sections[i]);
    if let Some(s) = old_rsrc {
        if s.ptr_raw as u64 + s.size_of_raw as u64 == out.len() as u64 {
            out.truncate(s.ptr_raw as usize);
        }
    }

    let mut num_sections = view.num_sections;

    match tree {
        Some(tree) => {
            let new_rva = to_u32(
                align_up(view.size_of_image as u64, view.section_alignment.max(1) as u64),
                "section RVA",
            )?;
            let data = serialize_rsrc(&tree, new_rva)?;
            let raw_off = align_up(out.len() as u64, view.file_alignment.max(1) as u64);
            let raw_size = align_up(data.len() as u64, view.file_alignment.max(1) as u64);

            let header_off = match old_rsrc {
                Some(s) => {
                    // Move the .rsrc header to the last slot so virtual
                    // addresses stay ascending.
                    let table = view.sect_table_off;
                    let idx = view
                        .sections
                        .iter()
                        .position(|x| x.header_off == s.header_off)
                        .unwrap();
                    let last = view.num_sections as usize - 1;
                    let src = table + (idx + 1) * SECTION_HEADER_SIZE;
                    let end = table + (last + 1) * SECTION_HEADER_SIZE;
                    out.copy_within(src..end, table + idx * SECTION_HEADER_SIZE);
                    table + last * SECTION_HEADER_SIZE
                }
                None => {
                    let off = view.sect_table_off
                        + view.num_sections as usize * SECTION_HEADER_SIZE;
                    if off + SECTION_HEADER_SIZE > view.size_of_headers as usize {
                        return Err(InjectError::InsufficientHeaderSlack(format!(
                            "section table ends at {off}, SizeOfHeaders is {}",
                            view.size_of_headers
                        )));
                    }
                    num_sections += 1;
                    off
                }
            };

            out[header_off..header_off + 8].copy_from_slice(&RSRC_NAME);
            E.write_u32(&mut out, header_off + 8, to_u32(data.len() as u64, "VirtualSize")?)?;
            E.write_u32(&mut out, header_off + 12, new_rva)?;
            E.write_u32(&mut out, header_off + 16, to_u32(raw_size, "SizeOfRawData")?)?;
            E.write_u32(&mut out, header_off + 20, to_u32(raw_off, "PointerToRawData")?)?;
            for field in [24usize, 28, 32] {
                E.write_u32(&mut out, header_off + field, 0)?;
            }
            E.write_u16(&mut out, header_off + 34, 0)?;
            E.write_u32(&mut out, header_off + 36, RSRC_CHARACTERISTICS)?;

            out.resize(to_usize(raw_off, "PointerToRawData")?, 0);
            out.extend_from_slice(&data);
            out.resize(to_usize(raw_off + raw_size, "raw section end")?, 0);

            view.set_data_dir(
                &mut out,
                DATA_DIR_RESOURCE,
                new_rva,
                to_u32(data.len() as u64, "resource directory size")?,
            )?;
            let image_end = align_up(
                new_rva as u64 + data.len() as u64,
                view.section_alignment.max(1) as u64,
            );
            E.write_u32(&mut out, view.opt_off + 56, to_u32(image_end, "SizeOfImage")?)?;
        }
        None => {
            // Tree is empty: drop the .rsrc section entirely.
            if let Some(s) = old_rsrc {
                let table = view.sect_table_off;
                let idx = view
                    .sections
                    .iter()
                    .position(|x| x.header_off == s.header_off)
                    .unwrap();
                let last = view.num_sections as usize;
                let src = table + (idx + 1) * SECTION_HEADER_SIZE;
                let end = table + last * SECTION_HEADER_SIZE;
                out.copy_within(src..end, table + idx * SECTION_HEADER_SIZE);
                out[end - SECTION_HEADER_SIZE..end].fill(0);
                num_sections -= 1;
            }
            view.set_data_dir(&mut out, DATA_DIR_RESOURCE, 0, 0)?;
        }
    }

    E.write_u16(&mut out, view.coff_off + 2, num_sections)?;
    update_checksum(&mut out, view.checksum_off)?;
    Ok(out)
}

/// The standard PE header checksum: 16-bit one's-complement-style sum with
/// carry folding, plus the file length.  The checksum field itself counts
/// as zero.
fn update_checksum(bin: &mut [u8], checksum_off: usize) -> Result<()> {
    E.write_u32(bin, checksum_off, 0)?;
    let mut sum: u64 = 0;
    let mut i = 0;
    while i < bin.len() {
        let lo = bin[i] as u64;
        let hi = if i + 1 < bin.len() { bin[i + 1] as u64 } else { 0 };
        sum += lo | (hi << 8);
        sum = (sum & 0xFFFF) + (sum >> 16);
        i += 2;
    }
    sum = (sum & 0xFFFF) + (sum >> 16);
    let checksum = (sum as u32).wrapping_add(bin.len() as u32);
    E.write_u32(bin, checksum_off, checksum)
}
