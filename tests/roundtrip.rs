mod common;

use std::fs;

use bootimg::compress::{decode_to_vec, encode_to_vec};
use bootimg::header::{
    AospHeaderV0, AospHeaderV1, AospHeaderV2, AospHeaderV3, Field, HeaderKind, HeaderTrait,
    OsVersion, SamsungPxaHeader, VendorHeaderV3,
};
use bootimg::{
    repack, unpack, Block, ContainerFormat, Format, ImageFlags, ImageLayout, RepackOptions,
    UnpackOptions,
};
use common::*;
use sha1::{Digest, Sha1};
use sha2::Sha256;

const ID_OFFSET: usize = 576;
const ID_SIZE: usize = 32;

fn unpack_then_repack(ws: &Workspace, out: &str) -> Vec<u8> {
    unpack(ws.image(), ws.artifacts(), &UnpackOptions::default()).unwrap();
    repack(ws.image(), ws.output(out), ws.artifacts(), &RepackOptions::default()).unwrap();
    read(&ws.output(out))
}

fn sample_v0() -> Vec<u8> {
    build_image(
        AospHeaderV0::default(),
        &[
            (Field::KernelSize, &[0x11; 3000]),
            (Field::RamdiskSize, &text_payload(50)),
            (Field::SecondSize, &[0x22; 10]),
        ],
    )
}

#[test]
fn repack_only_rewrites_the_digest() {
    let image = sample_v0();
    let ws = Workspace::new(&image);
    let first = unpack_then_repack(&ws, "first.img");

    assert_eq!(first.len(), image.len());
    assert_eq!(first[..ID_OFFSET], image[..ID_OFFSET]);
    assert_eq!(first[ID_OFFSET + ID_SIZE..], image[ID_OFFSET + ID_SIZE..]);

    // A repacked image is a fixed point.
    let ws = Workspace::new(&first);
    let second = unpack_then_repack(&ws, "second.img");
    assert_eq!(second, first);
}

#[test]
fn sha1_digest_covers_blocks_and_sizes() {
    let ramdisk = text_payload(50);
    let ws = Workspace::new(&sample_v0());
    let out = unpack_then_repack(&ws, "new.img");

    let mut expected = Sha1::new();
    expected.update([0x11; 3000]);
    expected.update(3000u32.to_le_bytes());
    expected.update(&ramdisk);
    expected.update((ramdisk.len() as u32).to_le_bytes());
    expected.update([0x22; 10]);
    expected.update(10u32.to_le_bytes());
    let expected = expected.finalize();

    let id = &out[ID_OFFSET..ID_OFFSET + ID_SIZE];
    assert_eq!(&id[..20], &expected[..]);
    // All-zero tail means SHA-1 width.
    assert!(id[20..].iter().all(|&b| b == 0));
    let layout = ImageLayout::parse(&out).unwrap();
    assert!(!layout.flags().contains(ImageFlags::SHA256));
}

#[test]
fn sha256_digest_includes_recovery_dtbo_and_dtb() {
    let mut header = AospHeaderV2::default();
    header.id_mut().unwrap()[ID_SIZE - 1] = 1;
    let image = build_image(
        header,
        &[
            (Field::KernelSize, &[1; 100]),
            (Field::RamdiskSize, &[2; 100]),
            (Field::RecoveryDtboSize, &[3; 64]),
            (Field::DtbSize, &[4; 32]),
        ],
    );
    let ws = Workspace::new(&image);
    let out = unpack_then_repack(&ws, "new.img");

    let layout = ImageLayout::parse(&out).unwrap();
    assert!(layout.flags().contains(ImageFlags::SHA256));
    assert_eq!(layout.header().recovery_dtbo_offset(), Some(6144));
    assert_eq!(layout.range(Block::RecoveryDtbo), 6144..6208);

    let mut expected = Sha256::new();
    for (byte, len) in [(1u8, 100u32), (2, 100), (0, 0), (3, 64), (4, 32)] {
        expected.update(vec![byte; len as usize]);
        expected.update(len.to_le_bytes());
    }
    assert_eq!(layout.header().id().unwrap(), &expected.finalize()[..]);
}

#[test]
fn v1_header_size_is_synced() {
    let mut header = AospHeaderV1::default();
    header.set(Field::HeaderSize, 0);
    let image = build_image(header, &[(Field::KernelSize, &[5; 10])]);
    let ws = Workspace::new(&image);
    let out = unpack_then_repack(&ws, "new.img");

    let layout = ImageLayout::parse(&out).unwrap();
    assert_eq!(layout.header().get(Field::HeaderSize), Some(1648));
}

#[test]
fn blocks_stay_page_aligned() {
    for page_size in [2048u32, 4096, 16384] {
        let mut header = AospHeaderV0::default();
        header.set_page_size(page_size);
        let image = build_image(
            header,
            &[
                (Field::KernelSize, &[0x11; 3000]),
                (Field::RamdiskSize, &[0x22; 5000]),
                (Field::SecondSize, &[0x33; 100]),
            ],
        );
        let ws = Workspace::new(&image);
        let out = unpack_then_repack(&ws, "new.img");

        let layout = ImageLayout::parse(&out).unwrap();
        assert_eq!(layout.header().page_size(), page_size);
        for block in [Block::Kernel, Block::Ramdisk, Block::Second] {
            let range = layout.range(block);
            assert!(!range.is_empty());
            assert_eq!(range.start % page_size as usize, 0, "{block} at page {page_size}");
        }
    }
}

#[test]
fn mtk_sub_header_tracks_payload_size() {
    let payload = [0x33; 1000];
    let mut kernel = mtk_header(b"KERNEL", 0xdead);
    kernel.extend_from_slice(&payload);
    let image = build_image(AospHeaderV0::default(), &[(Field::KernelSize, &kernel)]);
    let ws = Workspace::new(&image);

    unpack(ws.image(), ws.artifacts(), &UnpackOptions::default()).unwrap();
    assert_eq!(read(&ws.artifact("kernel")), payload);

    repack(ws.image(), ws.output("new.img"), ws.artifacts(), &RepackOptions::default()).unwrap();
    let out = read(&ws.output("new.img"));
    let layout = ImageLayout::parse(&out).unwrap();
    assert!(layout.flags().contains(ImageFlags::MTK_KERNEL));
    assert_eq!(layout.header().kernel_size(), Some(1512));

    let mtk = layout.mtk_range(Block::Kernel).unwrap();
    assert_eq!(u32::from_le_bytes(out[mtk.start + 4..mtk.start + 8].try_into().unwrap()), 1000);
    assert_eq!(&out[layout.range(Block::Kernel)], &payload[..]);
}

#[test]
fn compressed_ramdisk_is_recompressed() {
    let cpio = text_payload(2000);
    let ramdisk = encode_to_vec(Format::Gzip, &cpio).unwrap();
    let image = build_image(
        AospHeaderV0::default(),
        &[(Field::KernelSize, &[0x11; 64]), (Field::RamdiskSize, &ramdisk)],
    );
    let ws = Workspace::new(&image);

    unpack(ws.image(), ws.artifacts(), &UnpackOptions::default()).unwrap();
    assert_eq!(read(&ws.artifact("ramdisk.cpio")), cpio);

    let mut patched = cpio.clone();
    patched.extend_from_slice(b"one more line\n");
    fs::write(ws.artifact("ramdisk.cpio"), &patched).unwrap();
    repack(ws.image(), ws.output("new.img"), ws.artifacts(), &RepackOptions::default()).unwrap();

    let out = read(&ws.output("new.img"));
    let layout = ImageLayout::parse(&out).unwrap();
    assert_eq!(layout.format(Block::Ramdisk), Format::Gzip);
    let stored = &out[layout.range(Block::Ramdisk)];
    assert_eq!(decode_to_vec(Format::Gzip, stored).unwrap(), patched);
}

#[test]
fn skip_flags_keep_payloads_as_stored() {
    let cpio = text_payload(2000);
    let ramdisk = encode_to_vec(Format::Gzip, &cpio).unwrap();
    let image = build_image(
        AospHeaderV0::default(),
        &[(Field::KernelSize, &[0x11; 64]), (Field::RamdiskSize, &ramdisk)],
    );
    let ws = Workspace::new(&image);

    let options = UnpackOptions {
        skip_decompress: true,
        ..UnpackOptions::default()
    };
    unpack(ws.image(), ws.artifacts(), &options).unwrap();
    assert_eq!(read(&ws.artifact("ramdisk.cpio")), ramdisk);

    // Already compressed artifacts are stored verbatim.
    repack(ws.image(), ws.output("a.img"), ws.artifacts(), &RepackOptions::default()).unwrap();
    let out = read(&ws.output("a.img"));
    let layout = ImageLayout::parse(&out).unwrap();
    assert_eq!(&out[layout.range(Block::Ramdisk)], &ramdisk[..]);

    // And raw ones too when compression is skipped.
    fs::write(ws.artifact("ramdisk.cpio"), &cpio).unwrap();
    let options = RepackOptions { skip_compress: true };
    repack(ws.image(), ws.output("b.img"), ws.artifacts(), &options).unwrap();
    let out = read(&ws.output("b.img"));
    let layout = ImageLayout::parse(&out).unwrap();
    assert_eq!(&out[layout.range(Block::Ramdisk)], &cpio[..]);
}

#[test]
fn kernel_dtb_is_split_and_reattached() {
    let fdt = tiny_fdt();
    let mut kernel = vec![0x44; 500];
    kernel.extend_from_slice(&fdt);
    let image = build_image(AospHeaderV0::default(), &[(Field::KernelSize, &kernel)]);
    let ws = Workspace::new(&image);

    unpack(ws.image(), ws.artifacts(), &UnpackOptions::default()).unwrap();
    assert_eq!(read(&ws.artifact("kernel")), vec![0x44; 500]);
    assert_eq!(read(&ws.artifact("kernel_dtb")), fdt);

    repack(ws.image(), ws.output("new.img"), ws.artifacts(), &RepackOptions::default()).unwrap();
    let out = read(&ws.output("new.img"));
    let layout = ImageLayout::parse(&out).unwrap();
    assert_eq!(layout.header().kernel_size(), Some(kernel.len() as u32));
    assert_eq!(&out[2048..2048 + kernel.len()], &kernel[..]);
}

#[test]
fn missing_artifacts_leave_blocks_empty() {
    let ws = Workspace::new(&sample_v0());
    unpack(ws.image(), ws.artifacts(), &UnpackOptions::default()).unwrap();
    fs::remove_file(ws.artifact("second")).unwrap();

    repack(ws.image(), ws.output("new.img"), ws.artifacts(), &RepackOptions::default()).unwrap();
    let out = read(&ws.output("new.img"));
    let layout = ImageLayout::parse(&out).unwrap();
    assert_eq!(layout.header().second_size(), Some(0));
    assert!(layout.range(Block::Second).is_empty());
}

#[test]
fn header_artifact_edits_are_applied() {
    let mut header = AospHeaderV0::default();
    header.set_os_version(OsVersion::new(9, 0, 0, 2020, 3));
    let image = build_image(header, &[(Field::KernelSize, &[0x11; 64])]);
    let ws = Workspace::new(&image);

    let options = UnpackOptions {
        dump_header: true,
        ..UnpackOptions::default()
    };
    unpack(ws.image(), ws.artifacts(), &options).unwrap();
    let text = fs::read_to_string(ws.artifact("header")).unwrap();
    assert!(text.contains("os_version=9.0.0\n"));
    assert!(text.contains("os_patch_level=2020-03\n"));

    let edited: String = text
        .lines()
        .map(|line| match line.split_once('=') {
            Some(("cmdline", _)) => "cmdline=console=ttyS0 quiet".to_owned(),
            Some(("os_patch_level", _)) => "os_patch_level=2021-11".to_owned(),
            _ => line.to_owned(),
        })
        .map(|line| line + "\n")
        .collect();
    fs::write(ws.artifact("header"), edited).unwrap();

    repack(ws.image(), ws.output("new.img"), ws.artifacts(), &RepackOptions::default()).unwrap();
    let out = read(&ws.output("new.img"));
    let header = ImageLayout::parse(&out).unwrap().header().clone();
    assert_eq!(header.full_cmdline(), "console=ttyS0 quiet");
    let os_version = header.os_version().unwrap();
    assert_eq!(os_version.version(), (9, 0, 0));
    assert_eq!(os_version.patch_level(), (2021, 11));
}

fn put_u32(raw: &mut [u8], offset: usize, value: u32) {
    raw[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[test]
fn vendor_boot_round_trips() {
    let mut raw = vec![0u8; 2112];
    raw[..8].copy_from_slice(b"VNDRBOOT");
    put_u32(&mut raw, 8, 3);
    put_u32(&mut raw, 12, 4096);
    put_u32(&mut raw, 2096, 2112);
    let ramdisk = text_payload(300);
    let dtb = tiny_fdt();
    let image = build_image(
        VendorHeaderV3::parse(&raw).unwrap(),
        &[(Field::RamdiskSize, &ramdisk), (Field::DtbSize, &dtb)],
    );

    let layout = ImageLayout::parse(&image).unwrap();
    assert_eq!(layout.container(), ContainerFormat::AospVendor);
    assert!(matches!(layout.header(), HeaderKind::VendorV3(_)));
    assert!(layout.range(Block::Kernel).is_empty());
    assert_eq!(layout.range(Block::Ramdisk), 4096..4096 + ramdisk.len());
    let dtb_start = 4096 + ramdisk.len().div_ceil(4096) * 4096;
    assert_eq!(layout.range(Block::Dtb), dtb_start..dtb_start + dtb.len());

    let ws = Workspace::new(&image);
    let out = unpack_then_repack(&ws, "new.img");
    assert!(!ws.artifact("kernel").exists());
    assert_eq!(read(&ws.artifact("ramdisk.cpio")), ramdisk);
    assert_eq!(read(&ws.artifact("dtb")), dtb);
    assert_eq!(out, image);
}

#[test]
fn v3_uses_fixed_4k_pages() {
    let kernel = [0x11; 5000];
    let ramdisk = text_payload(100);
    let image = build_image(
        AospHeaderV3::default(),
        &[(Field::KernelSize, &kernel), (Field::RamdiskSize, &ramdisk)],
    );

    let layout = ImageLayout::parse(&image).unwrap();
    assert_eq!(layout.header().header_version(), 3);
    assert_eq!(layout.header().page_size(), 4096);
    assert_eq!(layout.range(Block::Kernel), 4096..4096 + kernel.len());
    assert_eq!(layout.range(Block::Ramdisk), 12288..12288 + ramdisk.len());

    let ws = Workspace::new(&image);
    assert_eq!(unpack_then_repack(&ws, "new.img"), image);
}

#[test]
fn pxa_round_trips_outside_the_digest() {
    const PXA_ID_OFFSET: usize = 584;

    let mut raw = vec![0u8; 1640];
    raw[..8].copy_from_slice(b"ANDROID!");
    put_u32(&mut raw, 36, 0x0300_0000);
    put_u32(&mut raw, 44, 2048);
    let kernel = [0x11; 3000];
    let ramdisk = text_payload(40);
    let extra = [0x33; 200];
    let image = build_image(
        SamsungPxaHeader::parse(&raw).unwrap(),
        &[
            (Field::KernelSize, &kernel),
            (Field::RamdiskSize, &ramdisk),
            (Field::ExtraSize, &extra),
        ],
    );
    assert_eq!(u32::from_le_bytes(image[32..36].try_into().unwrap()), 200);

    let layout = ImageLayout::parse(&image).unwrap();
    assert_eq!(layout.container(), ContainerFormat::Pxa);
    assert_eq!(layout.header().page_size(), 2048);
    assert_eq!(layout.range(Block::Kernel), 2048..5048);
    assert_eq!(layout.range(Block::Ramdisk), 6144..6144 + ramdisk.len());
    assert_eq!(layout.range(Block::Extra), 8192..8392);

    let ws = Workspace::new(&image);
    let out = unpack_then_repack(&ws, "new.img");
    assert_eq!(read(&ws.artifact("extra")), extra);
    assert_eq!(out.len(), image.len());
    assert_eq!(out[..PXA_ID_OFFSET], image[..PXA_ID_OFFSET]);
    assert_eq!(out[PXA_ID_OFFSET + ID_SIZE..], image[PXA_ID_OFFSET + ID_SIZE..]);
}

