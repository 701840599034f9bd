//! ELF engine: ELF32 and ELF64, both endiannesses.
//!
//! # Strategy
//!
//! Resources are plain `SHT_PROGBITS` sections with no `SHF_ALLOC` flag, so
//! no program header is touched and the loader's view of the file never
//! changes.  All growth happens past the original end of file:
//!
//! 1. payload appended at EOF (8-byte aligned);
//! 2. `.shstrtab` re-appended at EOF when the section name is new;
//! 3. the section header table itself re-appended at EOF, `e_shoff` /
//!    `e_shnum` updated.
//!
//! When the current section header table (or a previously injected payload)
//! already sits at EOF it is truncated first, so repeated injection reaches
//! a fixed point instead of growing the file on every run.  Replacement
//! reuses the existing header slot; payload bytes that cannot be truncated
//! become dead space, which is the documented trade-off for never moving
//! loader-visible regions.

use crate::endian::{align_up, slice, to_usize, Endian};
use crate::error::{InjectError, Result};
use crate::resource::ResourceKind;

const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

const SHT_PROGBITS: u32 = 1;

fn ehdr_shoff_off(is64: bool) -> usize {
    if is64 {
        0x28
    } else {
        0x20
    }
}

fn shdr_size(is64: bool) -> usize {
    if is64 {
        64
    } else {
        40
    }
}

// ── Parsed views ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct ElfHeader {
    endian: Endian,
    is64: bool,
    e_shoff: u64,
    e_shnum: u16,
    e_shentsize: u16,
    e_shstrndx: u16,
}

impl ElfHeader {
    fn parse(bin: &[u8]) -> Result<Self> {
        let ident = slice(bin, 0, 16)?;
        if &ident[0..4] != b"\x7FELF" {
            return Err(InjectError::MalformedBinary("missing ELF magic".into()));
        }
        let is64 = match ident[EI_CLASS] {
            ELFCLASS32 => false,
            ELFCLASS64 => true,
            c => {
                return Err(InjectError::MalformedBinary(format!(
                    "unknown ELF class {c}"
                )))
            }
        };
        let endian = match ident[EI_DATA] {
            ELFDATA2LSB => Endian::Little,
            ELFDATA2MSB => Endian::Big,
            d => {
                return Err(InjectError::MalformedBinary(format!(
                    "unknown ELF data encoding {d}"
                )))
            }
        };
        let (e_shoff, shnum_off) = if is64 {
            (endian.read_u64(bin, 0x28)?, 0x3C)
        } else {
            (endian.read_u32(bin, 0x20)? as u64, 0x30)
        };
        let e_shentsize = endian.read_u16(bin, shnum_off - 2)?;
        let e_shnum = endian.read_u16(bin, shnum_off)?;
        let e_shstrndx = endian.read_u16(bin, shnum_off + 2)?;
        if e_shnum == 0 || e_shoff == 0 {
            return Err(InjectError::MalformedBinary(
                "no section header table (stripped or extended numbering)".into(),
            ));
        }
        if (e_shentsize as usize) < shdr_size(is64) {
            return Err(InjectError::MalformedBinary(format!(
                "e_shentsize {e_shentsize} below the {} bytes this class requires",
                shdr_size(is64)
            )));
        }
        if e_shstrndx >= e_shnum {
            return Err(InjectError::MalformedBinary(format!(
                "e_shstrndx {e_shstrndx} out of range (e_shnum {e_shnum})"
            )));
        }
        Ok(Self {
            endian,
            is64,
            e_shoff,
            e_shnum,
            e_shentsize,
            e_shstrndx,
        })
    }
}

/// One section header, widened to 64-bit fields.
#[derive(Debug, Clone, Default)]
struct Shdr {
    name: u32,
    sh_type: u32,
    flags: u64,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
    info: u32,
    addralign: u64,
    entsize: u64,
}

fn read_shdrs(bin: &[u8], h: &ElfHeader) -> Result<Vec<Shdr>> {
    let base = to_usize(h.e_shoff, "e_shoff")?;
    let table_len = h.e_shnum as usize * h.e_shentsize as usize;
    slice(bin, base, table_len)?; // bounds check up front
    let e = h.endian;
    let mut out = Vec::with_capacity(h.e_shnum as usize);
    for i in 0..h.e_shnum as usize {
        let o = base + i * h.e_shentsize as usize;
        let s = if h.is64 {
            Shdr {
                name: e.read_u32(bin, o)?,
                sh_type: e.read_u32(bin, o + 4)?,
                flags: e.read_u64(bin, o + 8)?,
                addr: e.read_u64(bin, o + 16)?,
                offset: e.read_u64(bin, o + 24)?,
                size: e.read_u64(bin, o + 32)?,
                link: e.read_u32(bin, o + 40)?,
                info: e.read_u32(bin, o + 44)?,
                addralign: e.read_u64(bin, o + 48)?,
                entsize: e.read_u64(bin, o + 56)?,
            }
        } else {
            Shdr {
                name: e.read_u32(bin, o)?,
                sh_type: e.read_u32(bin, o + 4)?,
                flags: e.read_u32(bin, o + 8)? as u64,
                addr: e.read_u32(bin, o + 12)? as u64,
                offset: e.read_u32(bin, o + 16)? as u64,
                size: e.read_u32(bin, o + 20)? as u64,
                link: e.read_u32(bin, o + 24)?,
                info: e.read_u32(bin, o + 28)?,
                addralign: e.read_u32(bin, o + 32)? as u64,
                entsize: e.read_u32(bin, o + 36)? as u64,
            }
        };
        out.push(s);
    }
    Ok(out)
}

fn write_shdr(buf: &mut Vec<u8>, h: &ElfHeader, s: &Shdr) -> Result<()> {
    let e = h.endian;
    let o = buf.len();
    buf.resize(o + shdr_size(h.is64), 0);
    if h.is64 {
        e.write_u32(buf, o, s.name)?;
        e.write_u32(buf, o + 4, s.sh_type)?;
        e.write_u64(buf, o + 8, s.flags)?;
        e.write_u64(buf, o + 16, s.addr)?;
        e.write_u64(buf, o + 24, s.offset)?;
        e.write_u64(buf, o + 32, s.size)?;
        e.write_u32(buf, o + 40, s.link)?;
        e.write_u32(buf, o + 44, s.info)?;
        e.write_u64(buf, o + 48, s.addralign)?;
        e.write_u64(buf, o + 56, s.entsize)?;
    } else {
        let narrow = |v: u64, what: &str| crate::endian::to_u32(v, what);
        e.write_u32(buf, o, s.name)?;
        e.write_u32(buf, o + 4, s.sh_type)?;
        e.write_u32(buf, o + 8, narrow(s.flags, "sh_flags")?)?;
        e.write_u32(buf, o + 12, narrow(s.addr, "sh_addr")?)?;
        e.write_u32(buf, o + 16, narrow(s.offset, "sh_offset")?)?;
        e.write_u32(buf, o + 20, narrow(s.size, "sh_size")?)?;
        e.write_u32(buf, o + 24, s.link)?;
        e.write_u32(buf, o + 28, s.info)?;
        e.write_u32(buf, o + 32, narrow(s.addralign, "sh_addralign")?)?;
        e.write_u32(buf, o + 36, narrow(s.entsize, "sh_entsize")?)?;
    }
    Ok(())
}

/// Section name from `.shstrtab`, or `None` when out of range.
fn section_name<'a>(strtab: &'a [u8], name_off: u32) -> Option<&'a str> {
    let start = name_off as usize;
    if start >= strtab.len() {
        return None;
    }
    let end = strtab[start..].iter().position(|&b| b == 0)? + start;
    std::str::from_utf8(&strtab[start..end]).ok()
}

fn load_strtab<'a>(bin: &'a [u8], h: &ElfHeader, shdrs: &[Shdr]) -> Result<&'a [u8]> {
    let st = &shdrs[h.e_shstrndx as usize];
    slice(
        bin,
        to_usize(st.offset, "shstrtab offset")?,
        to_usize(st.size, "shstrtab size")?,
    )
}

fn find_section_index(
    bin: &[u8],
    h: &ElfHeader,
    shdrs: &[Shdr],
    name: &str,
) -> Result<Option<usize>> {
    let strtab = load_strtab(bin, h, shdrs)?;
    Ok(shdrs
        .iter()
        .position(|s| section_name(strtab, s.name) == Some(name)))
}

// ── Public engine surface ────────────────────────────────────────────────────

pub(crate) fn find_region(bin: &[u8], kind: ResourceKind) -> Result<Option<(u64, u64)>> {
    let h = ElfHeader::parse(bin)?;
    let shdrs = read_shdrs(bin, &h)?;
    match find_section_index(bin, &h, &shdrs, kind.elf_section())? {
        None => Ok(None),
        Some(i) => {
            let s = &shdrs[i];
            if s.offset + s.size > bin.len() as u64 {
                return Err(InjectError::MalformedBinary(format!(
                    "section {} region {}+{} lies outside the file",
                    kind.elf_section(),
                    s.offset,
                    s.size
                )));
            }
            Ok(Some((s.offset, s.size)))
        }
    }
}

pub(crate) fn insert_or_replace(bin: &[u8], kind: ResourceKind, record: &[u8]) -> Result<Vec<u8>> {
    let h = ElfHeader::parse(bin)?;
    let mut shdrs = read_shdrs(bin, &h)?;
    let existing = find_section_index(bin, &h, &shdrs, kind.elf_section())?;

    let mut out = bin.to_vec();

    // Reclaim tail regions we own, so replays reach a fixed point.
    let table_len = h.e_shnum as u64 * h.e_shentsize as u64;
    if h.e_shoff + table_len == out.len() as u64 {
        out.truncate(to_usize(h.e_shoff, "e_shoff")?);
    }
    if let Some(i) = existing {
        let s = &shdrs[i];
        // The tail region may be followed by up to 7 alignment padding
        // bytes left by a previous table write.
        if align_up(s.offset + s.size, 8) >= out.len() as u64 {
            out.truncate(to_usize(s.offset, "sh_offset")?);
        }
    }

    // 1. Payload at EOF, 8-byte aligned.
    let payload_off = align_up(out.len() as u64, 8);
    out.resize(to_usize(payload_off, "payload offset")?, 0);
    out.extend_from_slice(record);

    match existing {
        Some(i) => {
            shdrs[i].offset = payload_off;
            shdrs[i].size = record.len() as u64;
        }
        None => {
            // 2. Grow .shstrtab with the new name, relocated to EOF.
            let strtab = load_strtab(bin, &h, &shdrs)?;
            let name_off = strtab.len() as u32;
            let mut new_strtab = strtab.to_vec();
            new_strtab.extend_from_slice(kind.elf_section().as_bytes());
            new_strtab.push(0);

            let strtab_off = align_up(out.len() as u64, 8);
            out.resize(to_usize(strtab_off, "shstrtab offset")?, 0);
            out.extend_from_slice(&new_strtab);

            let st = &mut shdrs[h.e_shstrndx as usize];
            st.offset = strtab_off;
            st.size = new_strtab.len() as u64;

            shdrs.push(Shdr {
                name: name_off,
                sh_type: SHT_PROGBITS,
                flags: 0,
                addr: 0,
                offset: payload_off,
                size: record.len() as u64,
                link: 0,
                info: 0,
                addralign: 8,
                entsize: 0,
            });
        }
    }

    write_table_and_header(&mut out, &h, &shdrs)?;
    Ok(out)
}

pub(crate) fn remove(bin: &[u8], kind: ResourceKind) -> Result<Vec<u8>> {
    let h = ElfHeader::parse(bin)?;
    let mut shdrs = read_shdrs(bin, &h)?;
    let Some(i) = find_section_index(bin, &h, &shdrs, kind.elf_section())? else {
        return Err(InjectError::NotFound(kind));
    };
    if i == h.e_shstrndx as usize {
        return Err(InjectError::MalformedBinary(
            "refusing to remove the section name table".into(),
        ));
    }

    let mut out = bin.to_vec();
    let table_len = h.e_shnum as u64 * h.e_shentsize as u64;
    if h.e_shoff + table_len == out.len() as u64 {
        out.truncate(to_usize(h.e_shoff, "e_shoff")?);
    }
    let victim = shdrs.remove(i);
    if align_up(victim.offset + victim.size, 8) >= out.len() as u64 {
        out.truncate(to_usize(victim.offset, "sh_offset")?);
    }

    // Dropping a header slot renumbers everything after it.
    let mut h = h;
    if (h.e_shstrndx as usize) > i {
        h.e_shstrndx -= 1;
        let shnum_off = if h.is64 { 0x3C } else { 0x30 };
        h.endian.write_u16(&mut out, shnum_off + 2, h.e_shstrndx)?;
    }
    for s in shdrs.iter_mut() {
        if s.link as usize > i {
            s.link -= 1;
        }
    }

    write_table_and_header(&mut out, &h, &shdrs)?;
    Ok(out)
}

/// Serialize the section header table at EOF and patch `e_shoff`/`e_shnum`.
/// Entries are padded out to the file's declared `e_shentsize`.
fn write_table_and_header(out: &mut Vec<u8>, h: &ElfHeader, shdrs: &[Shdr]) -> Result<()> {
    let table_off = align_up(out.len() as u64, 8);
    out.resize(to_usize(table_off, "e_shoff")?, 0);
    for s in shdrs {
        let entry_start = out.len();
        write_shdr(out, h, s)?;
        out.resize(entry_start + h.e_shentsize as usize, 0);
    }

    let e = h.endian;
    if h.is64 {
        e.write_u64(out, ehdr_shoff_off(true), table_off)?;
        e.write_u16(out, 0x3C, shdrs.len() as u16)?;
    } else {
        e.write_u32(out, ehdr_shoff_off(false), crate::endian::to_u32(table_off, "e_shoff")?)?;
        e.write_u16(out, 0x30, shdrs.len() as u16)?;
    }
    Ok(())
}
