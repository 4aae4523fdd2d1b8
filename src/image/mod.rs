//! Boot image dissection.
//!
//! [`ImageLayout::parse`] works on any byte slice and records where every
//! block lives; [`BootImage`] pairs a layout with the memory map it was
//! parsed from.

use alloc::format;
use alloc::string::String;
use core::fmt;
use core::ops::Range;

use bitflags::bitflags;
use log::{debug, info};

use crate::container::ContainerFormat;
use crate::dtb::find_dtb_offset;
use crate::errors::ParseError;
use crate::format::Format;
use crate::header::{checked_align_to, Field, HeaderKind, HeaderTrait, SHA1_DIGEST_SIZE};
use crate::mtk::{MtkHeader, MTK_HEADER_SIZE};

#[cfg(feature = "std")]
mod mapped;

#[cfg(feature = "std")]
pub use self::mapped::BootImage;

/// Samsung `SEANDROIDENFORCE` tail marker.
pub const SEANDROID_MAGIC: &[u8; 16] = b"SEANDROIDENFORCE";
/// LG bump tail marker.
pub const LG_BUMP_MAGIC: &[u8; 16] =
    b"\x41\xa9\xe4\x67\x74\x4d\x1d\x1b\xa4\x29\xf2\xec\xea\x65\x52\x79";

bitflags! {
    /// Container quirks detected while parsing.
    pub struct ImageFlags: u32 {
        const MTK_KERNEL = 1 << 0;
        const MTK_RAMDISK = 1 << 1;
        /// Needs signing by an external tool after repacking.
        const CHROMEOS = 1 << 2;
        const DHTB = 1 << 3;
        const SEANDROID = 1 << 4;
        const LG_BUMP = 1 << 5;
        /// The `id` field holds a SHA-256 digest instead of SHA-1.
        const SHA256 = 1 << 6;
        const BLOB = 1 << 7;
        const NOOKHD = 1 << 8;
        const ACCLAIM = 1 << 9;
    }
}

/// Payload blocks, in on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Block {
    Kernel,
    /// Device tree appended to the kernel image.
    KernelDtb,
    Ramdisk,
    Second,
    Extra,
    RecoveryDtbo,
    Dtb,
}

impl Block {
    pub const ALL: [Block; 7] = [
        Block::Kernel,
        Block::KernelDtb,
        Block::Ramdisk,
        Block::Second,
        Block::Extra,
        Block::RecoveryDtbo,
        Block::Dtb,
    ];

    /// Name of the artifact this block is unpacked to.
    pub fn file_name(self) -> &'static str {
        match self {
            Block::Kernel => "kernel",
            Block::KernelDtb => "kernel_dtb",
            Block::Ramdisk => "ramdisk.cpio",
            Block::Second => "second",
            Block::Extra => "extra",
            Block::RecoveryDtbo => "recovery_dtbo",
            Block::Dtb => "dtb",
        }
    }

    /// Header field holding the block size. The kernel DTB is accounted
    /// for in the kernel size.
    pub fn size_field(self) -> Option<Field> {
        match self {
            Block::Kernel => Some(Field::KernelSize),
            Block::KernelDtb => None,
            Block::Ramdisk => Some(Field::RamdiskSize),
            Block::Second => Some(Field::SecondSize),
            Block::Extra => Some(Field::ExtraSize),
            Block::RecoveryDtbo => Some(Field::RecoveryDtboSize),
            Block::Dtb => Some(Field::DtbSize),
        }
    }

    /// Blocks that may carry a compressed payload.
    pub fn is_compressible(self) -> bool {
        matches!(self, Block::Kernel | Block::Ramdisk | Block::Extra)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.file_name())
    }
}

/// Where everything lives inside a boot image buffer. All ranges are
/// absolute offsets into the parsed buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLayout {
    header: HeaderKind,
    container: ContainerFormat,
    flags: ImageFlags,
    header_offset: usize,
    preamble: Range<usize>,
    kernel: Range<usize>,
    kernel_dtb: Range<usize>,
    ramdisk: Range<usize>,
    second: Range<usize>,
    extra: Range<usize>,
    recovery_dtbo: Range<usize>,
    dtb: Range<usize>,
    tail: Range<usize>,
    kernel_mtk: Option<Range<usize>>,
    ramdisk_mtk: Option<Range<usize>>,
    kernel_format: Format,
    ramdisk_format: Format,
    extra_format: Format,
    total_size: usize,
}

impl ImageLayout {
    /// Scans `buf` for a boot image and maps out its blocks.
    ///
    /// Wrappers (ChromeOS, DHTB, Tegra blob) are recorded and skipped; the
    /// scan stops at the first AOSP or vendor boot header.
    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        let mut flags = ImageFlags::empty();
        let mut preamble = 0..0;
        let mut pos = 0;

        while pos < buf.len() {
            let Some(container) = ContainerFormat::detect(&buf[pos..]) else {
                pos += 1;
                continue;
            };
            info!("{container}");
            let skip = container.skip();
            match container {
                ContainerFormat::ChromeOs => flags |= ImageFlags::CHROMEOS,
                ContainerFormat::Dhtb => flags |= ImageFlags::DHTB | ImageFlags::SEANDROID,
                ContainerFormat::Blob => {
                    flags |= ImageFlags::BLOB;
                    preamble = pos..pos + skip;
                }
                ContainerFormat::NookHd | ContainerFormat::Acclaim => {
                    flags |= if container == ContainerFormat::NookHd {
                        ImageFlags::NOOKHD
                    } else {
                        ImageFlags::ACCLAIM
                    };
                    preamble = pos..pos + skip;
                }
                ContainerFormat::Aosp | ContainerFormat::AospVendor | ContainerFormat::Pxa => {}
            }
            if container.is_terminal() {
                return Self::parse_at(buf, pos + skip, container, flags, preamble);
            }
            pos += skip;
        }

        Err(ParseError::UnknownContainer)
    }

    fn parse_at(
        buf: &[u8],
        header_offset: usize,
        container: ContainerFormat,
        mut flags: ImageFlags,
        preamble: Range<usize>,
    ) -> Result<Self, ParseError> {
        let src = buf.get(header_offset..).ok_or(ParseError::Truncated {
            needed: header_offset,
            available: buf.len(),
        })?;
        let header = HeaderKind::parse(src, container == ContainerFormat::AospVendor)?;
        debug!("{} header at offset {:#x}", header.name(), header_offset);

        if header.id().map_or(false, has_sha256_id) {
            flags |= ImageFlags::SHA256;
        }
        for (key, value) in header.summary() {
            info!("{key:<15} [{value}]");
        }

        let page_size = header.page_size() as usize;
        let mut off = header.header_space();
        // Sizes come straight from the header; every sum is checked.
        let overflow = || ParseError::Truncated {
            needed: usize::MAX,
            available: buf.len(),
        };
        let mut next_block = |field: Field| -> Result<Range<usize>, ParseError> {
            let size = header.get(field).unwrap_or(0) as usize;
            let start = header_offset.checked_add(off).ok_or_else(overflow)?;
            let end = start.checked_add(size).ok_or_else(overflow)?;
            if size > 0 && end > buf.len() {
                return Err(ParseError::Truncated {
                    needed: end,
                    available: buf.len(),
                });
            }
            off = off
                .checked_add(size)
                .and_then(|next| checked_align_to(next, page_size))
                .ok_or_else(overflow)?;
            if size > 0 {
                Ok(start..end)
            } else {
                // Empty blocks past an unpadded end stay inside the buffer.
                let at = start.min(buf.len());
                Ok(at..at)
            }
        };

        let mut kernel = next_block(Field::KernelSize)?;
        let mut ramdisk = next_block(Field::RamdiskSize)?;
        let second = next_block(Field::SecondSize)?;
        let extra = next_block(Field::ExtraSize)?;
        let recovery_dtbo = next_block(Field::RecoveryDtboSize)?;
        let dtb = next_block(Field::DtbSize)?;

        let tail_start = header_offset.saturating_add(off).min(buf.len());
        let tail = tail_start..buf.len();
        let tail_bytes = &buf[tail.clone()];
        if tail_bytes.starts_with(SEANDROID_MAGIC) {
            flags |= ImageFlags::SEANDROID;
        } else if tail_bytes.starts_with(LG_BUMP_MAGIC) {
            flags |= ImageFlags::LG_BUMP;
        }

        let mut kernel_dtb = kernel.end..kernel.end;
        if let Some(dtb_off) = find_dtb_offset(&buf[kernel.clone()]).filter(|&off| off > 0) {
            kernel_dtb = kernel.start + dtb_off..kernel.end;
            kernel.end = kernel_dtb.start;
            info!("{:<15} [{}]", "KERNEL_DTB", kernel_dtb.len());
        }

        let (kernel_mtk, kernel_format) =
            detect_payload(buf, &mut kernel, "KERNEL", ImageFlags::MTK_KERNEL, &mut flags);
        let (ramdisk_mtk, ramdisk_format) =
            detect_payload(buf, &mut ramdisk, "RAMDISK", ImageFlags::MTK_RAMDISK, &mut flags);
        let extra_format = if extra.is_empty() {
            Format::Unknown
        } else {
            let format = Format::detect_lg(&buf[extra.clone()]);
            info!("{:<15} [{}]", "EXTRA_FMT", format);
            format
        };

        Ok(ImageLayout {
            header,
            container,
            flags,
            header_offset,
            preamble,
            kernel,
            kernel_dtb,
            ramdisk,
            second,
            extra,
            recovery_dtbo,
            dtb,
            tail,
            kernel_mtk,
            ramdisk_mtk,
            kernel_format,
            ramdisk_format,
            extra_format,
            total_size: buf.len(),
        })
    }

    pub fn header(&self) -> &HeaderKind {
        &self.header
    }

    pub fn container(&self) -> ContainerFormat {
        self.container
    }

    pub fn flags(&self) -> ImageFlags {
        self.flags
    }

    pub fn header_offset(&self) -> usize {
        self.header_offset
    }

    /// The header record plus its page padding.
    pub fn header_range(&self) -> Range<usize> {
        let start = self.header_offset;
        start..(start + self.header.header_space()).min(self.total_size)
    }

    /// Wrapper or loader bytes that precede the header and are kept as-is.
    pub fn preamble(&self) -> Range<usize> {
        self.preamble.clone()
    }

    /// Payload range of `block`, excluding any MTK sub-header.
    pub fn range(&self, block: Block) -> Range<usize> {
        match block {
            Block::Kernel => self.kernel.clone(),
            Block::KernelDtb => self.kernel_dtb.clone(),
            Block::Ramdisk => self.ramdisk.clone(),
            Block::Second => self.second.clone(),
            Block::Extra => self.extra.clone(),
            Block::RecoveryDtbo => self.recovery_dtbo.clone(),
            Block::Dtb => self.dtb.clone(),
        }
    }

    /// Range of the MTK sub-header in front of `block`, if there is one.
    pub fn mtk_range(&self, block: Block) -> Option<Range<usize>> {
        match block {
            Block::Kernel => self.kernel_mtk.clone(),
            Block::Ramdisk => self.ramdisk_mtk.clone(),
            _ => None,
        }
    }

    /// Detected payload format. Blocks that are never compressed report
    /// [`Format::Unknown`].
    pub fn format(&self, block: Block) -> Format {
        match block {
            Block::Kernel => self.kernel_format,
            Block::Ramdisk => self.ramdisk_format,
            Block::Extra => self.extra_format,
            _ => Format::Unknown,
        }
    }

    /// Bytes after the last block.
    pub fn tail(&self) -> Range<usize> {
        self.tail.clone()
    }

    /// Size of the buffer the layout was parsed from.
    pub fn total_size(&self) -> usize {
        self.total_size
    }
}

/// A SHA-1 id leaves the bytes past the digest (and the 4 byte gap after
/// it) zeroed. An all-zero id counts as SHA-1.
fn has_sha256_id(id: &[u8]) -> bool {
    id.iter().skip(SHA1_DIGEST_SIZE + 4).any(|&b| b != 0)
}

/// Detects the payload format of `range`, peeling off an MTK sub-header
/// first when there is one.
fn detect_payload(
    buf: &[u8],
    range: &mut Range<usize>,
    label: &str,
    mtk_flag: ImageFlags,
    flags: &mut ImageFlags,
) -> (Option<Range<usize>>, Format) {
    if range.start >= range.end {
        return (None, Format::Unknown);
    }

    let mut format = Format::detect_lg(&buf[range.clone()]);
    let mut mtk_range = None;
    if format == Format::Mtk {
        if let Some(mtk) = MtkHeader::parse(&buf[range.clone()]) {
            info!("MTK_{label}_HDR");
            info!("{:<15} [{}]", label, mtk.size());
            info!("{:<15} [{}]", "NAME", String::from_utf8_lossy(mtk.name()));
            *flags |= mtk_flag;
            mtk_range = Some(range.start..range.start + MTK_HEADER_SIZE);
            range.start += MTK_HEADER_SIZE;
            format = Format::detect_lg(&buf[range.clone()]);
        }
    }
    info!("{:<15} [{}]", format!("{label}_FMT"), format);
    (mtk_range, format)
}
