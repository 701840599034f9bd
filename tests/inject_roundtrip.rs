//! End-to-end injection/extraction across all three formats, driven
//! through both the engine layer and the filesystem-level operations.

mod common;

use std::path::Path;

use binject::detect::{detect_format, Format};
use binject::engine::Engine;
use binject::error::InjectError;
use binject::ops::{self, InjectOptions};
use binject::record::encode_record;
use binject::resource::ResourceKind;

use common::*;

const PAYLOAD: &[u8] = b"Hello, binject!";

fn engines() -> [(Engine, Vec<u8>); 4] {
    [
        (Engine::Elf, make_elf64()),
        (Engine::MachO, make_macho64()),
        (Engine::MachO, make_fat_macho()),
        (Engine::Pe, make_pe64()),
    ]
}

#[test]
fn truncated_magic_only_file_detects_and_lists_empty() {
    // An 8-byte file carrying nothing but a Mach-O magic.
    let bytes = [0xFE, 0xED, 0xFA, 0xCE, 0, 0, 0, 0];
    assert_eq!(detect_format(&bytes), Format::MachO);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stub8");
    std::fs::write(&path, bytes).unwrap();
    assert!(ops::list(&path).unwrap().is_empty());
}

#[test]
fn fixtures_parse_cleanly() {
    for (engine, bin) in engines() {
        assert_eq!(detect_format(&bin), engine.format());
        assert!(engine.list(&bin).unwrap().is_empty());
    }
}

#[test]
fn round_trip_every_format() {
    for (engine, bin) in engines() {
        let record = encode_record(ResourceKind::Sea, PAYLOAD).unwrap();
        let out = engine.insert_or_replace(&bin, ResourceKind::Sea, &record).unwrap();

        // Executability proxy: magic intact, headers still walkable.
        assert_eq!(detect_format(&out), engine.format());
        let listed = engine.list(&out).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].kind, ResourceKind::Sea);
        assert_eq!(listed[0].payload_len, PAYLOAD.len() as u64);
        assert_ne!(listed[0].checksum, 0);

        assert_eq!(engine.extract(&out, ResourceKind::Sea).unwrap(), PAYLOAD);
    }
}

#[test]
fn container_identifiers_are_reported_verbatim() {
    let engine = Engine::Elf;
    let record = encode_record(ResourceKind::Sea, PAYLOAD).unwrap();
    let out = engine.insert_or_replace(&make_elf64(), ResourceKind::Sea, &record).unwrap();
    let listed = engine.list(&out).unwrap();
    assert_eq!(listed[0].container_name, "NODE_SEA_BLOB");

    let record = encode_record(ResourceKind::Vfs, PAYLOAD).unwrap();
    let out = Engine::MachO
        .insert_or_replace(&make_macho64(), ResourceKind::Vfs, &record)
        .unwrap();
    let listed = Engine::MachO.list(&out).unwrap();
    assert_eq!(listed[0].container_name, "__SMOL_VFS/__SMOL_VFS_BLOB");
}

#[test]
fn elf_injection_lands_past_original_eof() {
    let bin = make_elf64();
    let record = encode_record(ResourceKind::Sea, PAYLOAD).unwrap();
    let out = Engine::Elf.insert_or_replace(&bin, ResourceKind::Sea, &record).unwrap();

    let (off, size) = Engine::Elf.find_region(&out, ResourceKind::Sea).unwrap().unwrap();
    assert!(off >= bin.len() as u64);
    assert_eq!(size, record.len() as u64);
}

#[test]
fn no_collateral_damage_outside_updated_tables() {
    // ELF: everything between the original section table and the original
    // EOF must survive byte-for-byte.
    let bin = make_elf64();
    let record = encode_record(ResourceKind::Sea, PAYLOAD).unwrap();
    let out = Engine::Elf.insert_or_replace(&bin, ResourceKind::Sea, &record).unwrap();
    assert_eq!(&out[208..4096], &bin[208..4096]);
    assert_eq!(&out[64..75], &bin[64..75]); // original .shstrtab bytes

    // Mach-O: code bytes and the original segment's section data survive;
    // only the header counts and the slack region change.
    let bin = make_macho64();
    let out = Engine::MachO.insert_or_replace(&bin, ResourceKind::Sea, &record).unwrap();
    assert_eq!(&out[1024..4096], &bin[1024..4096]);
    assert_eq!(&out[32..184], &bin[32..184]); // __TEXT load command untouched

    // PE: DOS header, code section, and the original optional header
    // fields we do not own survive.
    let bin = make_pe64();
    let out = Engine::Pe.insert_or_replace(&bin, ResourceKind::Sea, &record).unwrap();
    assert_eq!(&out[0x200..0x400], &bin[0x200..0x400]);
    assert_eq!(&out[0..0x3C], &bin[0..0x3C]);
}

#[test]
fn reinjection_replaces_and_reaches_a_size_fixed_point() {
    let payload_a = b"AAAA first payload";
    let payload_b = b"BBBB second payload, a little longer";

    for (engine, bin) in engines() {
        let rec_a = encode_record(ResourceKind::Sea, payload_a).unwrap();
        let rec_b = encode_record(ResourceKind::Sea, payload_b).unwrap();

        let one = engine.insert_or_replace(&bin, ResourceKind::Sea, &rec_a).unwrap();
        let two = engine.insert_or_replace(&one, ResourceKind::Sea, &rec_b).unwrap();
        assert_eq!(engine.extract(&two, ResourceKind::Sea).unwrap(), payload_b);
        assert_eq!(engine.list(&two).unwrap().len(), 1);

        // Replaying the same payload must not grow the file without bound.
        let three = engine.insert_or_replace(&two, ResourceKind::Sea, &rec_b).unwrap();
        let four = engine.insert_or_replace(&three, ResourceKind::Sea, &rec_b).unwrap();
        assert_eq!(three.len(), four.len(), "replay grew a {:?} binary", engine);
        assert_eq!(engine.extract(&four, ResourceKind::Sea).unwrap(), payload_b);
    }
}

#[test]
fn sea_and_vfs_coexist() {
    let vfs_payload = vec![0x42u8; 2048];
    for (engine, bin) in engines() {
        let sea = encode_record(ResourceKind::Sea, PAYLOAD).unwrap();
        let vfs = encode_record(ResourceKind::Vfs, &vfs_payload).unwrap();
        let out = engine.insert_or_replace(&bin, ResourceKind::Sea, &sea).unwrap();
        let out = engine.insert_or_replace(&out, ResourceKind::Vfs, &vfs).unwrap();

        let listed = engine.list(&out).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(engine.extract(&out, ResourceKind::Sea).unwrap(), PAYLOAD);
        assert_eq!(engine.extract(&out, ResourceKind::Vfs).unwrap(), vfs_payload);
    }
}

#[test]
fn remove_restores_an_empty_listing() {
    for (engine, bin) in engines() {
        let record = encode_record(ResourceKind::Sea, PAYLOAD).unwrap();
        let out = engine.insert_or_replace(&bin, ResourceKind::Sea, &record).unwrap();
        let removed = engine.remove(&out, ResourceKind::Sea).unwrap();
        assert!(engine.list(&removed).unwrap().is_empty());
        assert_eq!(detect_format(&removed), engine.format());

        assert!(matches!(
            engine.remove(&bin, ResourceKind::Sea),
            Err(InjectError::NotFound(_))
        ));
    }
}

#[test]
fn extract_of_absent_kind_is_not_found() {
    for (engine, bin) in engines() {
        assert!(matches!(
            engine.extract(&bin, ResourceKind::Vfs),
            Err(InjectError::NotFound(ResourceKind::Vfs))
        ));
    }
}

#[test]
fn corrupted_payload_fails_verification() {
    let record = encode_record(ResourceKind::Sea, PAYLOAD).unwrap();
    let out = Engine::Elf.insert_or_replace(&make_elf64(), ResourceKind::Sea, &record).unwrap();
    let (off, _) = Engine::Elf.find_region(&out, ResourceKind::Sea).unwrap().unwrap();

    let mut corrupted = out.clone();
    corrupted[off as usize + 25] ^= 0xFF; // one payload byte
    assert!(matches!(
        Engine::Elf.extract(&corrupted, ResourceKind::Sea),
        Err(InjectError::IntegrityError(_))
    ));
}

// ── Filesystem-level operations ──────────────────────────────────────────────

#[test]
fn ops_inject_extract_verify() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("app");
    let output = dir.path().join("app-sea");
    let sea = dir.path().join("payload.blob");
    let extracted = dir.path().join("out.bin");

    std::fs::write(&input, make_elf64()).unwrap();
    std::fs::write(&sea, PAYLOAD).unwrap();

    let opts = InjectOptions {
        sea: Some(sea),
        ..InjectOptions::default()
    };
    ops::inject(&input, &output, &opts, &FakeCollab).unwrap();

    let listed = ops::list(&output).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].payload_len, PAYLOAD.len() as u64);

    assert_eq!(ops::verify(&output, ResourceKind::Sea).unwrap(), PAYLOAD);
    let n = ops::extract(&output, ResourceKind::Sea, &extracted).unwrap();
    assert_eq!(n, PAYLOAD.len() as u64);
    assert_eq!(std::fs::read(&extracted).unwrap(), PAYLOAD);
}

#[test]
fn vfs_without_sea_is_rejected_naming_both_flags() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("app");
    std::fs::write(&input, make_elf64()).unwrap();

    let opts = InjectOptions {
        vfs: Some(dir.path().join("vfs.blob")),
        ..InjectOptions::default()
    };
    let err = ops::inject(&input, &dir.path().join("out"), &opts, &FakeCollab).unwrap_err();
    let msg = err.to_string();
    assert!(matches!(err, InjectError::InvalidArg(_)));
    assert!(msg.contains("--vfs") && msg.contains("--sea"), "{msg}");
}

#[test]
fn missing_input_is_file_not_found() {
    let err = ops::list(Path::new("definitely/not/here")).unwrap_err();
    assert!(matches!(err, InjectError::FileNotFound(_)));
}

#[test]
fn non_executable_input_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.txt");
    std::fs::write(&input, b"just some text, no magic here").unwrap();
    assert!(matches!(
        ops::list(&input).unwrap_err(),
        InjectError::UnsupportedFormat
    ));
}

#[test]
fn failed_signing_deletes_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("app");
    let output = dir.path().join("app-sea");
    let sea = dir.path().join("payload.blob");
    std::fs::write(&input, make_macho64()).unwrap();
    std::fs::write(&sea, PAYLOAD).unwrap();

    let opts = InjectOptions {
        sea: Some(sea),
        ..InjectOptions::default()
    };
    let err = ops::inject(&input, &output, &opts, &FailingCollab).unwrap_err();
    assert!(matches!(err, InjectError::SigningFailed(_)));
    assert!(!output.exists(), "partial output must be deleted");
}
