//! Outer container detection.
//!
//! A boot image can sit behind several wrappers. [`ContainerFormat::detect`]
//! looks at one offset; the image parser calls it at every offset until the
//! real header shows up.

use core::fmt;

use crate::header::consts::{oem::*, BOOT_MAGIC, CMDLINE_OFFSET, NAME_OFFSET, VENDOR_BOOT_MAGIC};
use crate::header::is_pxa_header;

pub const CHROMEOS_MAGIC: &[u8] = b"CHROMEOS";
pub const DHTB_MAGIC: &[u8] = b"DHTB\x01\x00\x00\x00";
pub const TEGRABLOB_MAGIC: &[u8] = b"-SIGNED-BY-SIGNBLOB-";

/// ChromeOS images keep their signature blob in front of the header.
pub const CHROMEOS_SKIP: usize = 65536;

/// `DHTB` wrapper: magic, a SHA-256 of the payload, the payload size.
pub const DHTB_HEADER_SIZE: usize = 512;
pub const DHTB_CHECKSUM_OFFSET: usize = 8;
pub const DHTB_SIZE_OFFSET: usize = 48;

/// Tegra `-SIGNED-BY-SIGNBLOB-` wrapper.
pub const BLOB_HEADER_SIZE: usize = 104;
pub const BLOB_SIZE_OFFSET: usize = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// Plain AOSP `ANDROID!` header.
    Aosp,
    /// `VNDRBOOT` vendor boot header.
    AospVendor,
    ChromeOs,
    Dhtb,
    Blob,
    /// NookHD loader: a decoy header followed by the real one 1 MiB later.
    NookHd,
    /// Acclaim loader: like NookHD, with a 256 KiB preamble.
    Acclaim,
    /// Samsung PXA header.
    Pxa,
}

impl ContainerFormat {
    /// Identifies the container starting at `buf[0]`, if any.
    pub fn detect(buf: &[u8]) -> Option<ContainerFormat> {
        if buf.starts_with(CHROMEOS_MAGIC) {
            Some(ContainerFormat::ChromeOs)
        } else if buf.starts_with(DHTB_MAGIC) {
            Some(ContainerFormat::Dhtb)
        } else if buf.starts_with(TEGRABLOB_MAGIC) {
            Some(ContainerFormat::Blob)
        } else if buf.starts_with(&BOOT_MAGIC) {
            Some(Self::classify_aosp(buf))
        } else if buf.starts_with(&VENDOR_BOOT_MAGIC) {
            Some(ContainerFormat::AospVendor)
        } else {
            None
        }
    }

    fn classify_aosp(buf: &[u8]) -> ContainerFormat {
        let cmdline = buf.get(CMDLINE_OFFSET..).unwrap_or_default();
        let name = buf.get(NAME_OFFSET..).unwrap_or_default();
        if is_pxa_header(buf) {
            ContainerFormat::Pxa
        } else if NOOKHD_MAGICS.iter().any(|magic| cmdline.starts_with(magic)) {
            ContainerFormat::NookHd
        } else if name.starts_with(ACCLAIM_MAGIC) {
            ContainerFormat::Acclaim
        } else {
            ContainerFormat::Aosp
        }
    }

    /// Bytes between this match and the next thing worth looking at.
    pub fn skip(self) -> usize {
        match self {
            ContainerFormat::ChromeOs => CHROMEOS_SKIP,
            ContainerFormat::Dhtb => DHTB_HEADER_SIZE,
            ContainerFormat::Blob => BLOB_HEADER_SIZE,
            ContainerFormat::NookHd => NOOKHD_PRE_HEADER_SIZE,
            ContainerFormat::Acclaim => ACCLAIM_PRE_HEADER_SIZE,
            ContainerFormat::Aosp | ContainerFormat::AospVendor | ContainerFormat::Pxa => 0,
        }
    }

    /// Whether a boot header sits at (or `skip()` bytes after) this match.
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            ContainerFormat::ChromeOs | ContainerFormat::Dhtb | ContainerFormat::Blob
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ContainerFormat::Aosp => "AOSP",
            ContainerFormat::AospVendor => "AOSP_VENDOR",
            ContainerFormat::ChromeOs => "CHROMEOS",
            ContainerFormat::Dhtb => "DHTB_HDR",
            ContainerFormat::Blob => "TEGRA_BLOB",
            ContainerFormat::NookHd => "NOOKHD_LOADER",
            ContainerFormat::Acclaim => "ACCLAIM_LOADER",
            ContainerFormat::Pxa => "PXA_BOOT_HDR",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}
