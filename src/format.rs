//! Payload format sniffing.
//!
//! Detection only looks at leading magic bytes, except for the legacy LZ4
//! refinement in [`Format::detect_lg`] which walks the block framing.

use byteorder::{ByteOrder, LittleEndian};
use core::fmt;

pub const GZIP1_MAGIC: &[u8] = b"\x1f\x8b";
pub const GZIP2_MAGIC: &[u8] = b"\x1f\x9e";
pub const LZOP_MAGIC: &[u8] = b"\x89LZO";
pub const XZ_MAGIC: &[u8] = b"\xfd7zXZ";
pub const BZIP_MAGIC: &[u8] = b"BZh";
pub const LZ41_MAGIC: &[u8] = b"\x03\x21\x4c\x18";
pub const LZ42_MAGIC: &[u8] = b"\x04\x22\x4d\x18";
pub const LZ4_LEG_MAGIC: &[u8] = b"\x02\x21\x4c\x18";
pub const MTK_MAGIC: &[u8] = b"\x88\x16\x88\x58";
pub const DTB_MAGIC: &[u8] = b"\xd0\x0d\xfe\xed";
pub const ZIMAGE_MAGIC: &[u8] = b"\x18\x28\x6f\x01";
const ZIMAGE_MAGIC_OFFSET: usize = 0x24;

/// Known payload encodings, plus the few non-compressed markers that show
/// up at the start of boot image blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Unknown,
    Gzip,
    /// Gzip produced by zopfli. Never detected, only requested.
    Zopfli,
    Xz,
    Lzma,
    Bzip2,
    /// LZ4 frame format.
    Lz4,
    Lz4Legacy,
    /// Legacy LZ4 with a trailing uncompressed size, as found on LG devices.
    Lz4Lg,
    Lzop,
    Mtk,
    Dtb,
    Zimage,
}

/// LZMA-alone has no real magic: properties byte `0x5d`, a dictionary
/// size starting `00 00`, and an uncompressed size whose top byte is `00`
/// (known size) or `ff` (unknown).
fn is_lzma_alone(buf: &[u8]) -> bool {
    buf.len() >= 13 && buf.starts_with(b"\x5d\x00\x00") && matches!(buf[12], 0x00 | 0xff)
}

impl Format {
    /// Identifies `buf` by its leading bytes.
    pub fn detect(buf: &[u8]) -> Format {
        let matches = |magic: &[u8]| buf.starts_with(magic);

        if matches(GZIP1_MAGIC) || matches(GZIP2_MAGIC) {
            Format::Gzip
        } else if matches(LZOP_MAGIC) {
            Format::Lzop
        } else if matches(XZ_MAGIC) {
            Format::Xz
        } else if is_lzma_alone(buf) {
            Format::Lzma
        } else if matches(BZIP_MAGIC) {
            Format::Bzip2
        } else if matches(LZ41_MAGIC) || matches(LZ42_MAGIC) {
            Format::Lz4
        } else if matches(LZ4_LEG_MAGIC) {
            Format::Lz4Legacy
        } else if matches(MTK_MAGIC) {
            Format::Mtk
        } else if matches(DTB_MAGIC) {
            Format::Dtb
        } else if buf
            .get(ZIMAGE_MAGIC_OFFSET..ZIMAGE_MAGIC_OFFSET + ZIMAGE_MAGIC.len())
            .map_or(false, |magic| magic == ZIMAGE_MAGIC)
        {
            Format::Zimage
        } else {
            Format::Unknown
        }
    }

    /// Like [`Format::detect`], but tells LG flavoured legacy LZ4 apart:
    /// a block length running past the end of the buffer means the stream
    /// ends with the LG size trailer instead of another block.
    pub fn detect_lg(buf: &[u8]) -> Format {
        let format = Format::detect(buf);
        if format != Format::Lz4Legacy {
            return format;
        }

        let mut off = 4;
        while off + 4 <= buf.len() {
            let block_size = LittleEndian::read_u32(&buf[off..]) as usize;
            off += 4;
            if block_size > buf.len() - off {
                return Format::Lz4Lg;
            }
            off += block_size;
        }
        format
    }

    /// Formats this crate can decode and re-encode.
    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            Format::Gzip
                | Format::Zopfli
                | Format::Xz
                | Format::Lzma
                | Format::Bzip2
                | Format::Lz4
                | Format::Lz4Legacy
                | Format::Lz4Lg
        )
    }

    /// Any compressed format, including ones without a codec.
    pub fn is_compressed_any(self) -> bool {
        self.is_compressed() || self == Format::Lzop
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Unknown => "raw",
            Format::Gzip => "gzip",
            Format::Zopfli => "zopfli",
            Format::Xz => "xz",
            Format::Lzma => "lzma",
            Format::Bzip2 => "bzip2",
            Format::Lz4 => "lz4",
            Format::Lz4Legacy => "lz4_legacy",
            Format::Lz4Lg => "lz4_lg",
            Format::Lzop => "lzop",
            Format::Mtk => "mtk",
            Format::Dtb => "dtb",
            Format::Zimage => "zimage",
        }
    }

    /// File extension conventionally used for this format.
    pub fn ext(self) -> &'static str {
        match self {
            Format::Gzip | Format::Zopfli => ".gz",
            Format::Xz => ".xz",
            Format::Lzma => ".lzma",
            Format::Bzip2 => ".bz2",
            Format::Lz4 | Format::Lz4Legacy | Format::Lz4Lg => ".lz4",
            Format::Lzop => ".lzo",
            _ => "",
        }
    }

    /// Looks a format up by [`Format::name`].
    pub fn from_name(name: &str) -> Option<Format> {
        [
            Format::Gzip,
            Format::Zopfli,
            Format::Xz,
            Format::Lzma,
            Format::Bzip2,
            Format::Lz4,
            Format::Lz4Legacy,
            Format::Lz4Lg,
        ]
        .into_iter()
        .find(|format| format.name() == name)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}
