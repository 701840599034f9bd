//! Shared fixtures: minimal synthetic binaries for each format, plus fake
//! collaborators so no external tool is needed.

#![allow(dead_code)]

use std::path::Path;

use binject::collab::Collaborator;
use binject::error::{InjectError, Result};

// ── Little-endian field writers ──────────────────────────────────────────────

pub fn put16(b: &mut [u8], off: usize, v: u16) {
    b[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

pub fn put32(b: &mut [u8], off: usize, v: u32) {
    b[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

pub fn put64(b: &mut [u8], off: usize, v: u64) {
    b[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

pub fn put32_be(b: &mut [u8], off: usize, v: u32) {
    b[off..off + 4].copy_from_slice(&v.to_be_bytes());
}

// ── Synthetic binaries ───────────────────────────────────────────────────────

/// 4 KiB ELF64 LE executable: null section + `.shstrtab`, no program
/// headers, section header table at offset 80 (not at EOF).
pub fn make_elf64() -> Vec<u8> {
    let mut b = vec![0u8; 4096];
    b[0..4].copy_from_slice(b"\x7FELF");
    b[4] = 2; // ELFCLASS64
    b[5] = 1; // little-endian
    b[6] = 1; // EV_CURRENT
    put16(&mut b, 16, 2); // ET_EXEC
    put16(&mut b, 18, 0x3E); // EM_X86_64
    put32(&mut b, 20, 1);
    put64(&mut b, 24, 0x40_1000); // e_entry
    put64(&mut b, 40, 80); // e_shoff
    put16(&mut b, 52, 64); // e_ehsize
    put16(&mut b, 54, 56); // e_phentsize
    put16(&mut b, 58, 64); // e_shentsize
    put16(&mut b, 60, 2); // e_shnum
    put16(&mut b, 62, 1); // e_shstrndx

    // .shstrtab content
    b[64..75].copy_from_slice(b"\0.shstrtab\0");

    // shdr[0] stays zero; shdr[1] = .shstrtab
    let o = 80 + 64;
    put32(&mut b, o, 1); // sh_name → ".shstrtab"
    put32(&mut b, o + 4, 3); // SHT_STRTAB
    put64(&mut b, o + 24, 64); // sh_offset
    put64(&mut b, o + 32, 11); // sh_size
    put64(&mut b, o + 48, 1); // sh_addralign
    b
}

/// 4 KiB thin Mach-O 64 LE (arm64) executable with one `__TEXT` segment
/// holding one `__text` section at offset 1024, leaving generous header
/// slack.
pub fn make_macho64() -> Vec<u8> {
    let mut b = vec![0u8; 4096];
    put32(&mut b, 0, 0xFEED_FACF); // MH_MAGIC_64, LE on disk
    put32(&mut b, 4, 0x0100_000C); // CPU_TYPE_ARM64
    put32(&mut b, 12, 2); // MH_EXECUTE
    put32(&mut b, 16, 1); // ncmds
    put32(&mut b, 20, 152); // sizeofcmds
    // LC_SEGMENT_64 __TEXT
    let o = 32;
    put32(&mut b, o, 0x19);
    put32(&mut b, o + 4, 152);
    b[o + 8..o + 14].copy_from_slice(b"__TEXT");
    put64(&mut b, o + 24, 0x1_0000_0000); // vmaddr
    put64(&mut b, o + 32, 0x4000); // vmsize
    put64(&mut b, o + 48, 4096); // filesize
    put32(&mut b, o + 56, 5); // maxprot r-x
    put32(&mut b, o + 60, 5); // initprot
    put32(&mut b, o + 64, 1); // nsects
    // section_64 __text
    let s = o + 72;
    b[s..s + 6].copy_from_slice(b"__text");
    b[s + 16..s + 22].copy_from_slice(b"__TEXT");
    put64(&mut b, s + 32, 0x1_0000_0400); // addr
    put64(&mut b, s + 40, 16); // size
    put32(&mut b, s + 48, 1024); // offset
    put32(&mut b, s + 52, 2); // align
    b[1024..1040].fill(0x90);
    b
}

/// Universal binary wrapping two thin slices (arm64 + x86_64) at 4 KiB
/// alignment.
pub fn make_fat_macho() -> Vec<u8> {
    let slice1 = make_macho64();
    let mut slice2 = make_macho64();
    put32(&mut slice2, 4, 0x0100_0007); // CPU_TYPE_X86_64

    let mut b = vec![0u8; 4096];
    put32_be(&mut b, 0, 0xCAFE_BABE);
    put32_be(&mut b, 4, 2);
    for (i, (cputype, offset, size)) in [
        (0x0100_000Cu32, 4096u32, slice1.len() as u32),
        (0x0100_0007, 4096 + 4096, slice2.len() as u32),
    ]
    .iter()
    .enumerate()
    {
        let o = 8 + i * 20;
        put32_be(&mut b, o, *cputype);
        put32_be(&mut b, o + 8, *offset);
        put32_be(&mut b, o + 12, *size);
        put32_be(&mut b, o + 16, 12); // 2^12 alignment
    }
    b.extend_from_slice(&slice1);
    b.resize(8192, 0);
    b.extend_from_slice(&slice2);
    b
}

/// 1 KiB PE32+ (x86-64) executable with one `.text` section and sixteen
/// empty data directories.  SizeOfHeaders leaves room for exactly one more
/// section header.
pub fn make_pe64() -> Vec<u8> {
    let mut b = vec![0u8; 0x400];
    b[0] = b'M';
    b[1] = b'Z';
    put32(&mut b, 0x3C, 0x80);
    b[0x80..0x84].copy_from_slice(b"PE\0\0");
    // COFF header
    let c = 0x84;
    put16(&mut b, c, 0x8664);
    put16(&mut b, c + 2, 1); // NumberOfSections
    put16(&mut b, c + 16, 240); // SizeOfOptionalHeader
    put16(&mut b, c + 18, 0x0022); // EXECUTABLE_IMAGE | LARGE_ADDRESS_AWARE
    // Optional header (PE32+)
    let o = 0x98;
    put16(&mut b, o, 0x20B);
    put32(&mut b, o + 16, 0x1000); // AddressOfEntryPoint
    put32(&mut b, o + 20, 0x1000); // BaseOfCode
    put64(&mut b, o + 24, 0x1_4000_0000); // ImageBase
    put32(&mut b, o + 32, 0x1000); // SectionAlignment
    put32(&mut b, o + 36, 0x200); // FileAlignment
    put16(&mut b, o + 48, 6); // MajorSubsystemVersion
    put32(&mut b, o + 56, 0x2000); // SizeOfImage
    put32(&mut b, o + 60, 0x200); // SizeOfHeaders
    put16(&mut b, o + 68, 3); // IMAGE_SUBSYSTEM_WINDOWS_CUI
    put32(&mut b, o + 108, 16); // NumberOfRvaAndSizes
    // Section table: .text
    let s = o + 240;
    b[s..s + 5].copy_from_slice(b".text");
    put32(&mut b, s + 8, 0x10); // VirtualSize
    put32(&mut b, s + 12, 0x1000); // VirtualAddress
    put32(&mut b, s + 16, 0x200); // SizeOfRawData
    put32(&mut b, s + 20, 0x200); // PointerToRawData
    put32(&mut b, s + 36, 0x6000_0020); // CODE | EXECUTE | READ
    b[0x200..0x210].fill(0xCC);
    b
}

// ── Fake collaborators ───────────────────────────────────────────────────────

pub const BLOB_BYTES: &[u8] = b"generated SEA blob contents";

fn xor(mut v: Vec<u8>) -> Vec<u8> {
    for b in &mut v {
        *b ^= 0xA5;
    }
    v
}

/// XOR stands in for the compression codec so stub round-trips need no
/// external tool; blob generation honours the config's `output` field the
/// way the runtime does.
pub struct FakeCollab;

impl Collaborator for FakeCollab {
    fn sign(&self, _binary: &Path) -> Result<()> {
        Ok(())
    }

    fn decompress(&self, input: &Path, output: &Path) -> Result<()> {
        let data = std::fs::read(input)?;
        std::fs::write(output, xor(data))?;
        Ok(())
    }

    fn compress(&self, input: &Path, output: &Path, _existing_stub: Option<&Path>) -> Result<()> {
        let data = std::fs::read(input)?;
        std::fs::write(output, xor(data))?;
        Ok(())
    }

    fn generate_blob(&self, config: &Path, workdir: &Path) -> Result<()> {
        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(config)?)
            .map_err(|e| InjectError::BlobGenerationFailed(e.to_string()))?;
        let output = raw["output"].as_str().ok_or_else(|| {
            InjectError::BlobGenerationFailed("config has no output field".into())
        })?;
        std::fs::write(workdir.join(output), BLOB_BYTES)?;
        Ok(())
    }
}

/// Un-xor a fake-compressed image (for assertions on stub internals).
pub fn fake_decompress(image: &[u8]) -> Vec<u8> {
    xor(image.to_vec())
}

/// A collaborator whose every capability fails, for error-path tests.
pub struct FailingCollab;

impl Collaborator for FailingCollab {
    fn sign(&self, _binary: &Path) -> Result<()> {
        Err(InjectError::SigningFailed("fake signer rejects everything".into()))
    }

    fn decompress(&self, _input: &Path, _output: &Path) -> Result<()> {
        Err(InjectError::CollaboratorError {
            name: "decompressor",
            detail: "fake decompressor rejects everything".into(),
        })
    }

    fn compress(&self, _input: &Path, _output: &Path, _existing: Option<&Path>) -> Result<()> {
        Err(InjectError::CollaboratorError {
            name: "compressor",
            detail: "fake compressor rejects everything".into(),
        })
    }

    fn generate_blob(&self, _config: &Path, _workdir: &Path) -> Result<()> {
        Err(InjectError::BlobGenerationFailed("fake runtime rejects everything".into()))
    }
}
