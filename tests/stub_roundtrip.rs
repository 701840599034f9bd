//! Compressed-stub bridge: injection must reach the inner executable and
//! re-wrap it, leaving the outer stub structurally intact.

mod common;

use binject::auxcfg::{parse_update_config, serialize_update_config, UpdateConfig};
use binject::detect::{detect_format, Format};
use binject::engine::Engine;
use binject::ops::{self, InjectOptions};
use binject::record::encode_record;
use binject::resource::ResourceKind;
use binject::stub::{build_stub_payload, split_stub_payload};

use common::*;

const SEA_PAYLOAD: &[u8] = b"payload destined for the inner executable";

/// A Mach-O stub whose SMOL_COMPRESSED payload is a fake-compressed ELF.
fn make_stub(inner: &[u8], aux: &UpdateConfig) -> Vec<u8> {
    let image = fake_decompress(inner); // xor is its own inverse
    let payload = build_stub_payload(
        &serialize_update_config(aux),
        inner.len() as u64,
        1,
        &image,
    );
    let record = encode_record(ResourceKind::SmolCompressed, &payload).unwrap();
    Engine::MachO
        .insert_or_replace(&make_macho64(), ResourceKind::SmolCompressed, &record)
        .unwrap()
}

#[test]
fn inject_reaches_the_inner_executable() {
    let dir = tempfile::tempdir().unwrap();
    let stub_path = dir.path().join("stub");
    let output = dir.path().join("stub-out");
    let sea = dir.path().join("payload.blob");

    let inner = make_elf64();
    let aux = UpdateConfig {
        binname: "inner-app".to_owned(),
        ..UpdateConfig::default()
    };
    std::fs::write(&stub_path, make_stub(&inner, &aux)).unwrap();
    std::fs::write(&sea, SEA_PAYLOAD).unwrap();

    let opts = InjectOptions {
        sea: Some(sea),
        ..InjectOptions::default()
    };
    ops::inject(&stub_path, &output, &opts, &FakeCollab).unwrap();

    // The outer file is still a Mach-O stub with exactly one
    // SMOL_COMPRESSED container.
    let out_bytes = std::fs::read(&output).unwrap();
    assert_eq!(detect_format(&out_bytes), Format::MachO);
    let listed = Engine::MachO.list(&out_bytes).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].kind, ResourceKind::SmolCompressed);

    // Unwrap by hand: the inner ELF now carries the SEA payload.
    let payload = Engine::MachO
        .extract(&out_bytes, ResourceKind::SmolCompressed)
        .unwrap();
    let stub = split_stub_payload(&payload).unwrap();
    let new_inner = fake_decompress(&stub.image);
    assert_eq!(stub.inner_size, new_inner.len() as u64);
    assert_eq!(detect_format(&new_inner), Format::Elf);
    assert_eq!(
        Engine::Elf.extract(&new_inner, ResourceKind::Sea).unwrap(),
        SEA_PAYLOAD
    );

    // The aux record survives the round trip untouched.
    assert_eq!(parse_update_config(&stub.aux_record).unwrap(), aux);
}

#[test]
fn skip_repack_injects_into_the_stub_itself() {
    let dir = tempfile::tempdir().unwrap();
    let stub_path = dir.path().join("stub");
    let output = dir.path().join("stub-out");
    let sea = dir.path().join("payload.blob");

    let inner = make_elf64();
    std::fs::write(&stub_path, make_stub(&inner, &UpdateConfig::default())).unwrap();
    std::fs::write(&sea, SEA_PAYLOAD).unwrap();

    let opts = InjectOptions {
        sea: Some(sea),
        skip_repack: true,
        ..InjectOptions::default()
    };
    ops::inject(&stub_path, &output, &opts, &FakeCollab).unwrap();

    // The SEA container sits on the stub directly; the wrapped payload is
    // byte-identical to what was there before.
    let out_bytes = std::fs::read(&output).unwrap();
    assert_eq!(
        Engine::MachO.extract(&out_bytes, ResourceKind::Sea).unwrap(),
        SEA_PAYLOAD
    );
    let payload = Engine::MachO
        .extract(&out_bytes, ResourceKind::SmolCompressed)
        .unwrap();
    let stub = split_stub_payload(&payload).unwrap();
    assert_eq!(fake_decompress(&stub.image), inner);
}

#[test]
fn failing_decompressor_aborts_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let stub_path = dir.path().join("stub");
    let output = dir.path().join("stub-out");
    let sea = dir.path().join("payload.blob");

    std::fs::write(&stub_path, make_stub(&make_elf64(), &UpdateConfig::default())).unwrap();
    std::fs::write(&sea, SEA_PAYLOAD).unwrap();

    let opts = InjectOptions {
        sea: Some(sea),
        ..InjectOptions::default()
    };
    assert!(ops::inject(&stub_path, &output, &opts, &FailingCollab).is_err());
    assert!(!output.exists());
}
