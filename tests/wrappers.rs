mod common;

use std::fs;

use bootimg::compress::encode_to_vec;
use bootimg::header::{AospHeaderV0, Field, HeaderTrait};
use bootimg::image::{LG_BUMP_MAGIC, SEANDROID_MAGIC};
use bootimg::{
    repack, split_image_dtb, unpack, ContainerFormat, Error, Format, ImageFlags, ImageLayout,
    ParseError, RepackOptions, UnpackOptions, UnpackStatus,
};
use common::*;
use sha2::{Digest, Sha256};

fn inner_image() -> Vec<u8> {
    build_image(
        AospHeaderV0::default(),
        &[(Field::KernelSize, &[0x11; 100]), (Field::RamdiskSize, &[0x22; 100])],
    )
}

fn repack_default(ws: &Workspace, status: UnpackStatus) -> Vec<u8> {
    assert_eq!(
        unpack(ws.image(), ws.artifacts(), &UnpackOptions::default()).unwrap(),
        status
    );
    repack(ws.image(), ws.output("new.img"), ws.artifacts(), &RepackOptions::default()).unwrap();
    read(&ws.output("new.img"))
}

#[test]
fn dhtb_header_is_regenerated() {
    let mut image = vec![0u8; 512];
    image[..8].copy_from_slice(b"DHTB\x01\x00\x00\x00");
    image.extend_from_slice(&inner_image());
    let ws = Workspace::new(&image);
    let out = repack_default(&ws, UnpackStatus::Done);

    assert_eq!(&out[..8], b"DHTB\x01\x00\x00\x00");
    let size = u32::from_le_bytes(out[48..52].try_into().unwrap()) as usize;
    assert_eq!(size, out.len() - 512);
    assert_eq!(&out[8..40], &Sha256::digest(&out[512..])[..]);

    // DHTB images always get the SEAndroid trailer.
    let layout = ImageLayout::parse(&out).unwrap();
    assert!(layout.flags().contains(ImageFlags::DHTB | ImageFlags::SEANDROID));
    assert!(out[layout.tail()].starts_with(SEANDROID_MAGIC));
}

#[test]
fn chromeos_needs_signing_and_drops_the_wrapper() {
    let mut image = vec![0u8; 65536];
    image[..8].copy_from_slice(b"CHROMEOS");
    image.extend_from_slice(&inner_image());
    let ws = Workspace::new(&image);
    let out = repack_default(&ws, UnpackStatus::NeedsSigning);

    assert!(out.starts_with(b"ANDROID!"));
    // Not padded back to the wrapped size.
    assert_eq!(out.len(), inner_image().len());
    let layout = ImageLayout::parse(&out).unwrap();
    assert!(!layout.flags().contains(ImageFlags::CHROMEOS));
}

#[test]
fn blob_size_is_rewritten() {
    let mut image = vec![0u8; 104];
    image[..20].copy_from_slice(b"-SIGNED-BY-SIGNBLOB-");
    image[40..44].copy_from_slice(b"keep");
    image.extend_from_slice(&inner_image());
    let ws = Workspace::new(&image);
    let out = repack_default(&ws, UnpackStatus::Done);

    assert_eq!(&out[..20], b"-SIGNED-BY-SIGNBLOB-");
    assert_eq!(&out[40..44], b"keep");
    let size = u32::from_le_bytes(out[96..100].try_into().unwrap()) as usize;
    assert_eq!(size, out.len() - 104);
}

#[test]
fn acclaim_preamble_is_copied_verbatim() {
    let mut decoy = AospHeaderV0::default();
    decoy.board_name_mut().unwrap()[..10].copy_from_slice(b"BauwksBoot");
    let mut image = decoy.as_bytes().to_vec();
    image.resize(256 * 1024, 0x5a);
    image.extend_from_slice(&inner_image());
    let ws = Workspace::new(&image);
    let out = repack_default(&ws, UnpackStatus::Done);

    assert_eq!(out.len(), image.len());
    assert_eq!(out[..256 * 1024], image[..256 * 1024]);
    let layout = ImageLayout::parse(&out).unwrap();
    assert_eq!(layout.container(), ContainerFormat::Acclaim);
    assert_eq!(layout.header_offset(), 256 * 1024);
}

#[test]
fn lg_bump_trailer_survives() {
    let mut image = inner_image();
    image.extend_from_slice(LG_BUMP_MAGIC);
    let ws = Workspace::new(&image);
    let out = repack_default(&ws, UnpackStatus::Done);

    let layout = ImageLayout::parse(&out).unwrap();
    assert!(layout.flags().contains(ImageFlags::LG_BUMP));
    assert_eq!(&out[layout.tail()], &LG_BUMP_MAGIC[..]);
}

#[test]
fn unknown_container_is_an_error() {
    let ws = Workspace::new(&[0x5a; 8192]);
    let err = unpack(ws.image(), ws.artifacts(), &UnpackOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Parse(ParseError::UnknownContainer)));

    let err = repack(ws.image(), ws.output("new.img"), ws.artifacts(), &RepackOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::Parse(ParseError::UnknownContainer)));
    assert!(fs::read_dir(ws.artifacts()).unwrap().next().is_none());
}

#[test]
fn missing_image_names_the_path() {
    let ws = Workspace::new(&inner_image());
    let missing = ws.output("missing.img");
    match unpack(&missing, ws.artifacts(), &UnpackOptions::default()) {
        Err(Error::Io { path, .. }) => assert_eq!(path, missing),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn split_standalone_kernel() {
    let raw_kernel = text_payload(500);
    let mut kernel = encode_to_vec(Format::Gzip, &raw_kernel).unwrap();
    kernel.extend_from_slice(&tiny_fdt());
    let ws = Workspace::new(&inner_image());
    let path = ws.output("zImage-dtb");
    fs::write(&path, &kernel).unwrap();

    assert!(split_image_dtb(&path, ws.artifacts(), false).unwrap());
    assert_eq!(read(&ws.artifact("kernel")), raw_kernel);
    assert_eq!(read(&ws.artifact("kernel_dtb")), tiny_fdt());

    let plain = ws.output("Image");
    fs::write(&plain, &raw_kernel).unwrap();
    assert!(!split_image_dtb(&plain, ws.output("nothing"), false).unwrap());
}
