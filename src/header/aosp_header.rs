use alloc::vec;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

use super::consts::*;
use super::{HeaderLayout, HeaderTrait, VersionSource};
use crate::errors::ParseError;

const KERNEL_ADDR_OFFSET: usize = 12;
const RAMDISK_ADDR_OFFSET: usize = 20;
const SECOND_ADDR_OFFSET: usize = 28;
const TAGS_ADDR_OFFSET: usize = 32;

/// Version 0: the classic `mkbootimg` layout. The `header_version` slot
/// doubles as `extra_size`, which some vendors use for a DTB.
pub const AOSP_V0_LAYOUT: HeaderLayout = HeaderLayout {
    name: "AOSP_BOOT_HDR_V0",
    size: AOSP_V0_HEADER_SIZE,
    version: VersionSource::Fixed(0),
    fixed_page_size: None,
    page_size: Some(PAGE_SIZE_OFFSET),
    kernel_size: Some(8),
    ramdisk_size: Some(16),
    second_size: Some(24),
    extra_size: Some(HEADER_VERSION_OFFSET),
    recovery_dtbo_size: None,
    recovery_dtbo_offset: None,
    dtb_size: None,
    os_version: Some(44),
    header_size: None,
    board_name: Some((NAME_OFFSET, BOOT_NAME_SIZE)),
    cmdline: Some((CMDLINE_OFFSET, BOOT_ARGS_SIZE)),
    extra_cmdline: Some((608, BOOT_EXTRA_ARGS_SIZE)),
    id: Some((576, BOOT_ID_SIZE)),
};

/// Version 1 appends the recovery DTBO and a self-declared header size.
pub const AOSP_V1_LAYOUT: HeaderLayout = HeaderLayout {
    name: "AOSP_BOOT_HDR_V1",
    size: AOSP_V1_HEADER_SIZE,
    version: VersionSource::Field(HEADER_VERSION_OFFSET),
    extra_size: None,
    recovery_dtbo_size: Some(1632),
    recovery_dtbo_offset: Some(1636),
    header_size: Some(1644),
    ..AOSP_V0_LAYOUT
};

/// Version 2 appends the DTB.
pub const AOSP_V2_LAYOUT: HeaderLayout = HeaderLayout {
    name: "AOSP_BOOT_HDR_V2",
    size: AOSP_V2_HEADER_SIZE,
    dtb_size: Some(1648),
    ..AOSP_V1_LAYOUT
};

/// Version 3 is a compact layout: no second stage, no name, no id, and a
/// single 1536 byte command line. Pages are always 4K.
pub const AOSP_V3_LAYOUT: HeaderLayout = HeaderLayout {
    name: "AOSP_BOOT_HDR_V3",
    size: AOSP_V3_HEADER_SIZE,
    version: VersionSource::Field(HEADER_VERSION_OFFSET),
    fixed_page_size: Some(BOOT_V3_PAGE_SIZE),
    page_size: None,
    kernel_size: Some(8),
    ramdisk_size: Some(12),
    second_size: None,
    extra_size: None,
    recovery_dtbo_size: None,
    recovery_dtbo_offset: None,
    dtb_size: None,
    os_version: Some(16),
    header_size: Some(20),
    board_name: None,
    cmdline: Some((44, BOOT_ARGS_SIZE)),
    extra_cmdline: Some((44 + BOOT_ARGS_SIZE, BOOT_EXTRA_ARGS_SIZE)),
    id: None,
};

header_record!(
    /// AOSP boot image header, version 0.
    AospHeaderV0,
    AOSP_V0_LAYOUT
);

header_record!(
    /// AOSP boot image header, version 1.
    AospHeaderV1,
    AOSP_V1_LAYOUT
);

header_record!(
    /// AOSP boot image header, version 2.
    AospHeaderV2,
    AOSP_V2_LAYOUT
);

header_record!(
    /// AOSP boot image header, version 3.
    AospHeaderV3,
    AOSP_V3_LAYOUT
);

/// Fresh header bytes with the magic, the usual load addresses and a 2K page.
fn default_raw(size: usize, version: u32) -> Vec<u8> {
    let mut raw = vec![0; size];
    raw[..BOOT_MAGIC_SIZE].copy_from_slice(&BOOT_MAGIC);
    LittleEndian::write_u32(&mut raw[KERNEL_ADDR_OFFSET..], 0x1000_8000);
    LittleEndian::write_u32(&mut raw[RAMDISK_ADDR_OFFSET..], 0x1100_0000);
    LittleEndian::write_u32(&mut raw[SECOND_ADDR_OFFSET..], 0x100f_0000);
    LittleEndian::write_u32(&mut raw[TAGS_ADDR_OFFSET..], 0x1000_0100);
    LittleEndian::write_u32(&mut raw[PAGE_SIZE_OFFSET..], 2048);
    LittleEndian::write_u32(&mut raw[HEADER_VERSION_OFFSET..], version);
    raw
}

impl Default for AospHeaderV0 {
    fn default() -> Self {
        Self {
            raw: default_raw(AOSP_V0_HEADER_SIZE, 0),
        }
    }
}

impl Default for AospHeaderV1 {
    fn default() -> Self {
        let mut header = Self {
            raw: default_raw(AOSP_V1_HEADER_SIZE, 1),
        };
        header.sync_header_size();
        header
    }
}

impl Default for AospHeaderV2 {
    fn default() -> Self {
        let mut header = Self {
            raw: default_raw(AOSP_V2_HEADER_SIZE, 2),
        };
        header.sync_header_size();
        header
    }
}

impl Default for AospHeaderV3 {
    fn default() -> Self {
        let mut raw = vec![0; AOSP_V3_HEADER_SIZE];
        raw[..BOOT_MAGIC_SIZE].copy_from_slice(&BOOT_MAGIC);
        LittleEndian::write_u32(&mut raw[HEADER_VERSION_OFFSET..], 3);
        let mut header = Self { raw };
        header.sync_header_size();
        header
    }
}
