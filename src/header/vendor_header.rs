use alloc::vec::Vec;

use super::consts::*;
use super::{HeaderLayout, HeaderTrait, VersionSource};
use crate::errors::ParseError;

/// Vendor boot v3 (`VNDRBOOT`). Carries the vendor ramdisk and the DTB, the
/// kernel lives in the matching v3 boot image.
pub const VENDOR_V3_LAYOUT: HeaderLayout = HeaderLayout {
    name: "VENDOR_BOOT_HDR",
    size: VENDOR_V3_HEADER_SIZE,
    version: VersionSource::Field(8),
    fixed_page_size: None,
    page_size: Some(12),
    kernel_size: None,
    ramdisk_size: Some(24),
    second_size: None,
    extra_size: None,
    recovery_dtbo_size: None,
    recovery_dtbo_offset: None,
    dtb_size: Some(2100),
    os_version: None,
    header_size: Some(2096),
    board_name: Some((2080, BOOT_NAME_SIZE)),
    cmdline: Some((28, BOOT_ARGS_SIZE)),
    extra_cmdline: Some((28 + BOOT_ARGS_SIZE, VENDOR_BOOT_ARGS_SIZE - BOOT_ARGS_SIZE)),
    id: None,
};

header_record!(
    /// Vendor boot image header, version 3.
    VendorHeaderV3,
    VENDOR_V3_LAYOUT
);
