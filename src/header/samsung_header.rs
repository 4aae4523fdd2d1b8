use alloc::vec::Vec;

use super::consts::*;
use super::{HeaderLayout, HeaderTrait, VersionSource};
use crate::errors::ParseError;

/// Samsung PXA header. Shares the first 32 bytes with AOSP v0, then moves
/// `page_size` back by 8 bytes to make room for `extra_size` and an unknown
/// word. That unknown word sits where AOSP keeps `page_size` and always
/// holds a value far too large to be a page size, which is how these
/// headers are told apart.
pub const PXA_LAYOUT: HeaderLayout = HeaderLayout {
    name: "PXA_BOOT_HDR",
    size: PXA_HEADER_SIZE,
    version: VersionSource::Fixed(0),
    fixed_page_size: None,
    page_size: Some(44),
    kernel_size: Some(8),
    ramdisk_size: Some(16),
    second_size: Some(24),
    extra_size: Some(32),
    recovery_dtbo_size: None,
    recovery_dtbo_offset: None,
    dtb_size: None,
    os_version: None,
    header_size: None,
    board_name: Some((48, PXA_NAME_SIZE)),
    cmdline: Some((72, BOOT_ARGS_SIZE)),
    extra_cmdline: Some((616, BOOT_EXTRA_ARGS_SIZE)),
    id: Some((584, BOOT_ID_SIZE)),
};

header_record!(
    /// Samsung PXA boot image header.
    SamsungPxaHeader,
    PXA_LAYOUT
);
