//! MediaTek block sub-header.
//!
//! MTK boot images prefix the kernel and/or ramdisk payload with a 512 byte
//! record holding a magic, the payload size and a name tag.

use byteorder::{ByteOrder, LittleEndian};

use crate::format::MTK_MAGIC;
use crate::header::c_str;

pub const MTK_HEADER_SIZE: usize = 512;
const SIZE_OFFSET: usize = 4;
const NAME_OFFSET: usize = 8;
const NAME_SIZE: usize = 32;

/// Read-only view over an MTK sub-header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MtkHeader<'a> {
    raw: &'a [u8; MTK_HEADER_SIZE],
}

impl<'a> MtkHeader<'a> {
    /// Views the start of `block` as an MTK sub-header.
    pub fn parse(block: &'a [u8]) -> Option<Self> {
        let raw: &[u8; MTK_HEADER_SIZE] = block.get(..MTK_HEADER_SIZE)?.try_into().ok()?;
        if !raw.starts_with(MTK_MAGIC) {
            return None;
        }
        Some(MtkHeader { raw })
    }

    /// Payload size as declared by the sub-header.
    pub fn size(&self) -> u32 {
        LittleEndian::read_u32(&self.raw[SIZE_OFFSET..])
    }

    /// Name tag, e.g. `KERNEL` or `ROOTFS`.
    pub fn name(&self) -> &'a [u8] {
        c_str(&self.raw[NAME_OFFSET..NAME_OFFSET + NAME_SIZE])
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }
}

/// Overwrites the declared payload size of the sub-header at the start of
/// `block`.
pub fn set_size(block: &mut [u8], size: u32) {
    LittleEndian::write_u32(&mut block[SIZE_OFFSET..SIZE_OFFSET + 4], size);
}
