//! Boot image header layouts.
//!
//! Every supported layout is a fixed-size little-endian record. A parsed
//! header owns a copy of its raw bytes and all accessors read and write
//! straight into that buffer, so serializing a header is just handing out
//! [`HeaderTrait::as_bytes`].

use alloc::string::String;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};
use core::fmt;
use core2::io::{Error as IoError, Write};

use crate::errors::ParseError;

/// Declares an owned header record bound to a static [`HeaderLayout`].
macro_rules! header_record {
    ($(#[$meta:meta])* $name:ident, $layout:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            raw: Vec<u8>,
        }

        impl $name {
            /// Copies the record out of `src`. Fails if `src` is shorter
            /// than the layout.
            pub fn parse(src: &[u8]) -> Result<Self, ParseError> {
                Ok(Self {
                    raw: super::copy_raw(src, $layout.size)?,
                })
            }
        }

        impl HeaderTrait for $name {
            fn layout(&self) -> &'static HeaderLayout {
                &$layout
            }

            fn as_bytes(&self) -> &[u8] {
                &self.raw
            }

            fn as_bytes_mut(&mut self) -> &mut [u8] {
                &mut self.raw
            }
        }
    };
}

pub mod consts;
mod aosp_header;
mod os_version;
mod props;
mod samsung_header;
mod vendor_header;

pub use self::aosp_header::{AospHeaderV0, AospHeaderV1, AospHeaderV2, AospHeaderV3};
pub use self::os_version::OsVersion;
pub use self::samsung_header::SamsungPxaHeader;
pub use self::vendor_header::VendorHeaderV3;

use self::consts::*;

/// Width of the digest stored in the `id` field.
pub const SHA1_DIGEST_SIZE: usize = 20;
pub const SHA256_DIGEST_SIZE: usize = 32;

/// 32-bit scalar fields a header layout may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    PageSize,
    KernelSize,
    RamdiskSize,
    SecondSize,
    ExtraSize,
    RecoveryDtboSize,
    DtbSize,
    OsVersion,
    HeaderSize,
}

/// Where the header version comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    Fixed(u32),
    Field(usize),
}

/// Byte offsets of the fields present in one header layout. `None` marks a
/// field the layout does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLayout {
    pub name: &'static str,
    pub size: usize,
    pub version: VersionSource,
    /// Page size for layouts that do not store one.
    pub fixed_page_size: Option<u32>,
    pub page_size: Option<usize>,
    pub kernel_size: Option<usize>,
    pub ramdisk_size: Option<usize>,
    pub second_size: Option<usize>,
    pub extra_size: Option<usize>,
    pub recovery_dtbo_size: Option<usize>,
    /// 64-bit absolute file offset of the recovery DTBO.
    pub recovery_dtbo_offset: Option<usize>,
    pub dtb_size: Option<usize>,
    pub os_version: Option<usize>,
    pub header_size: Option<usize>,
    /// `(offset, len)` of the NUL padded product name.
    pub board_name: Option<(usize, usize)>,
    pub cmdline: Option<(usize, usize)>,
    pub extra_cmdline: Option<(usize, usize)>,
    pub id: Option<(usize, usize)>,
}

impl HeaderLayout {
    fn offset_of(&self, field: Field) -> Option<usize> {
        match field {
            Field::PageSize => self.page_size,
            Field::KernelSize => self.kernel_size,
            Field::RamdiskSize => self.ramdisk_size,
            Field::SecondSize => self.second_size,
            Field::ExtraSize => self.extra_size,
            Field::RecoveryDtboSize => self.recovery_dtbo_size,
            Field::DtbSize => self.dtb_size,
            Field::OsVersion => self.os_version,
            Field::HeaderSize => self.header_size,
        }
    }
}

/// Copies the first `size` bytes of `src` into an owned header buffer.
pub(crate) fn copy_raw(src: &[u8], size: usize) -> Result<Vec<u8>, ParseError> {
    match src.get(..size) {
        Some(raw) => Ok(raw.to_vec()),
        None => Err(ParseError::Truncated {
            needed: size,
            available: src.len(),
        }),
    }
}

fn region(raw: &[u8], span: Option<(usize, usize)>) -> Option<&[u8]> {
    span.map(|(offset, len)| &raw[offset..offset + len])
}

fn region_mut(raw: &mut [u8], span: Option<(usize, usize)>) -> Option<&mut [u8]> {
    match span {
        Some((offset, len)) => Some(&mut raw[offset..offset + len]),
        None => None,
    }
}

/// Cuts a NUL padded field at its first NUL.
pub(crate) fn c_str(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

/// Uniform accessors over all header layouts.
///
/// Getters for fields missing from a layout return `None`; setters for them
/// are no-ops and report `false`.
pub trait HeaderTrait {
    fn layout(&self) -> &'static HeaderLayout;
    fn as_bytes(&self) -> &[u8];
    fn as_bytes_mut(&mut self) -> &mut [u8];

    /// Size of the serialized header record.
    fn header_size(&self) -> usize {
        self.layout().size
    }

    /// Bytes taken by the header once padded to a page boundary.
    fn header_space(&self) -> usize {
        align_to(self.header_size(), self.page_size() as usize)
    }

    fn header_version(&self) -> u32 {
        match self.layout().version {
            VersionSource::Fixed(version) => version,
            VersionSource::Field(offset) => LittleEndian::read_u32(&self.as_bytes()[offset..]),
        }
    }

    fn get(&self, field: Field) -> Option<u32> {
        let offset = self.layout().offset_of(field)?;
        Some(LittleEndian::read_u32(&self.as_bytes()[offset..]))
    }

    fn set(&mut self, field: Field, value: u32) -> bool {
        match self.layout().offset_of(field) {
            Some(offset) => {
                LittleEndian::write_u32(&mut self.as_bytes_mut()[offset..], value);
                true
            }
            None => false,
        }
    }

    fn page_size(&self) -> u32 {
        match self.layout().fixed_page_size {
            Some(page_size) => page_size,
            None => self.get(Field::PageSize).unwrap_or(0),
        }
    }

    fn set_page_size(&mut self, value: u32) -> bool {
        self.set(Field::PageSize, value)
    }

    fn kernel_size(&self) -> Option<u32> {
        self.get(Field::KernelSize)
    }

    fn set_kernel_size(&mut self, value: u32) -> bool {
        self.set(Field::KernelSize, value)
    }

    fn ramdisk_size(&self) -> Option<u32> {
        self.get(Field::RamdiskSize)
    }

    fn set_ramdisk_size(&mut self, value: u32) -> bool {
        self.set(Field::RamdiskSize, value)
    }

    fn second_size(&self) -> Option<u32> {
        self.get(Field::SecondSize)
    }

    fn extra_size(&self) -> Option<u32> {
        self.get(Field::ExtraSize)
    }

    fn recovery_dtbo_size(&self) -> Option<u32> {
        self.get(Field::RecoveryDtboSize)
    }

    fn dtb_size(&self) -> Option<u32> {
        self.get(Field::DtbSize)
    }

    fn os_version(&self) -> Option<OsVersion> {
        self.get(Field::OsVersion).map(OsVersion::from)
    }

    fn set_os_version(&mut self, value: OsVersion) -> bool {
        self.set(Field::OsVersion, value.into())
    }

    fn recovery_dtbo_offset(&self) -> Option<u64> {
        let offset = self.layout().recovery_dtbo_offset?;
        Some(LittleEndian::read_u64(&self.as_bytes()[offset..]))
    }

    fn set_recovery_dtbo_offset(&mut self, value: u64) -> bool {
        match self.layout().recovery_dtbo_offset {
            Some(offset) => {
                LittleEndian::write_u64(&mut self.as_bytes_mut()[offset..], value);
                true
            }
            None => false,
        }
    }

    fn board_name(&self) -> Option<&[u8]> {
        region(self.as_bytes(), self.layout().board_name)
    }

    fn board_name_mut(&mut self) -> Option<&mut [u8]> {
        let span = self.layout().board_name;
        region_mut(self.as_bytes_mut(), span)
    }

    fn cmdline(&self) -> Option<&[u8]> {
        region(self.as_bytes(), self.layout().cmdline)
    }

    fn cmdline_mut(&mut self) -> Option<&mut [u8]> {
        let span = self.layout().cmdline;
        region_mut(self.as_bytes_mut(), span)
    }

    fn extra_cmdline(&self) -> Option<&[u8]> {
        region(self.as_bytes(), self.layout().extra_cmdline)
    }

    fn extra_cmdline_mut(&mut self) -> Option<&mut [u8]> {
        let span = self.layout().extra_cmdline;
        region_mut(self.as_bytes_mut(), span)
    }

    /// The `id` field (timestamp / checksum / sha1 / etc).
    fn id(&self) -> Option<&[u8]> {
        region(self.as_bytes(), self.layout().id)
    }

    fn id_mut(&mut self) -> Option<&mut [u8]> {
        let span = self.layout().id;
        region_mut(self.as_bytes_mut(), span)
    }

    /// Stores the real record size in the header's own `header_size` field.
    fn sync_header_size(&mut self) -> bool {
        let size = self.header_size() as u32;
        self.set(Field::HeaderSize, size)
    }

    /// Full command line: the main region followed by the extra region.
    fn full_cmdline(&self) -> String {
        let mut cmdline = String::new();
        for part in [self.cmdline(), self.extra_cmdline()].into_iter().flatten() {
            cmdline.push_str(&String::from_utf8_lossy(c_str(part)));
        }
        cmdline
    }

    fn write_to<W>(&self, dst: &mut W) -> Result<usize, IoError>
    where
        Self: Sized,
        W: Write,
    {
        dst.write_all(self.as_bytes())?;
        Ok(self.header_size())
    }
}

/// Rounds `size` up to the next multiple of `align`.
pub fn align_to(size: usize, align: usize) -> usize {
    if align == 0 {
        return size;
    }
    size.div_ceil(align) * align
}

/// [`align_to`] that reports overflow instead of wrapping.
pub fn checked_align_to(size: usize, align: usize) -> Option<usize> {
    if align == 0 {
        return Some(size);
    }
    size.div_ceil(align).checked_mul(align)
}

/// Zero bytes needed to bring `size` to a multiple of `align`.
pub fn align_padding(size: usize, align: usize) -> usize {
    align_to(size, align) - size
}

/// Whether the raw v0 `page_size` slot holds a value that marks a
/// Samsung PXA header.
pub fn is_pxa_header(src: &[u8]) -> bool {
    src.get(PAGE_SIZE_OFFSET..PAGE_SIZE_OFFSET + 4)
        .map(|raw| LittleEndian::read_u32(raw) >= PXA_PAGE_SIZE_THRESHOLD)
        .unwrap_or(false)
}

/// One parsed header of any supported layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderKind {
    AospV0(AospHeaderV0),
    AospV1(AospHeaderV1),
    AospV2(AospHeaderV2),
    AospV3(AospHeaderV3),
    VendorV3(VendorHeaderV3),
    SamsungPxa(SamsungPxaHeader),
}

macro_rules! dispatch {
    ($self:expr, $hdr:ident => $body:expr) => {
        match $self {
            HeaderKind::AospV0($hdr) => $body,
            HeaderKind::AospV1($hdr) => $body,
            HeaderKind::AospV2($hdr) => $body,
            HeaderKind::AospV3($hdr) => $body,
            HeaderKind::VendorV3($hdr) => $body,
            HeaderKind::SamsungPxa($hdr) => $body,
        }
    };
}

impl HeaderTrait for HeaderKind {
    fn layout(&self) -> &'static HeaderLayout {
        dispatch!(self, hdr => hdr.layout())
    }

    fn as_bytes(&self) -> &[u8] {
        dispatch!(self, hdr => hdr.as_bytes())
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        dispatch!(self, hdr => hdr.as_bytes_mut())
    }
}

impl HeaderKind {
    /// Interprets `src` as a boot header. Vendor boot magic always selects
    /// the vendor v3 layout; otherwise an oversized page size selects PXA
    /// and the stored header version picks the AOSP layout.
    pub fn parse(src: &[u8], vendor: bool) -> Result<Self, ParseError> {
        let header = if vendor {
            HeaderKind::VendorV3(VendorHeaderV3::parse(src)?)
        } else if is_pxa_header(src) {
            HeaderKind::SamsungPxa(SamsungPxaHeader::parse(src)?)
        } else {
            let version = src
                .get(HEADER_VERSION_OFFSET..HEADER_VERSION_OFFSET + 4)
                .map(LittleEndian::read_u32)
                .ok_or(ParseError::Truncated {
                    needed: HEADER_VERSION_OFFSET + 4,
                    available: src.len(),
                })?;
            match version {
                1 => HeaderKind::AospV1(AospHeaderV1::parse(src)?),
                2 => HeaderKind::AospV2(AospHeaderV2::parse(src)?),
                3 => HeaderKind::AospV3(AospHeaderV3::parse(src)?),
                _ => HeaderKind::AospV0(AospHeaderV0::parse(src)?),
            }
        };

        if header.page_size() == 0 {
            return Err(ParseError::NoPageSize);
        }
        Ok(header)
    }

    /// Short tag naming the layout, as logged while parsing.
    pub fn name(&self) -> &'static str {
        self.layout().name
    }

    /// Key/value lines describing the header, skipping fields the layout
    /// does not carry.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        use alloc::format;

        let mut lines = Vec::new();
        let version = self.header_version();
        lines.push(("HEADER_VER", format!("{version}")));
        for (key, value) in [
            ("KERNEL_SZ", self.kernel_size()),
            ("RAMDISK_SZ", self.ramdisk_size()),
            ("SECOND_SZ", self.second_size()),
            ("EXTRA_SZ", self.extra_size()),
            ("RECOV_DTBO_SZ", self.recovery_dtbo_size()),
            ("DTB_SZ", self.dtb_size()),
        ] {
            if let Some(value) = value {
                lines.push((key, format!("{value}")));
            }
        }
        if let Some(os_version) = self.os_version().filter(|v| !v.is_empty()) {
            lines.push(("OS_VERSION", os_version.version_string()));
            lines.push(("OS_PATCH_LEVEL", os_version.patch_level_string()));
        }
        lines.push(("PAGESIZE", format!("{}", self.page_size())));
        if let Some(name) = self.board_name() {
            lines.push(("NAME", String::from_utf8_lossy(c_str(name)).into_owned()));
        }
        lines.push(("CMDLINE", self.full_cmdline()));
        if let Some(id) = self.id() {
            let mut hex = String::with_capacity(id.len() * 2);
            for byte in id {
                hex.push_str(&format!("{byte:02x}"));
            }
            lines.push(("CHECKSUM", hex));
        }
        lines
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.summary() {
            writeln!(f, "{key:<15} [{value}]")?;
        }
        Ok(())
    }
}
