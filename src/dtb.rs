//! Finds a flattened device tree appended to a kernel image.

use byteorder::{BigEndian, ByteOrder};

pub const FDT_MAGIC: u32 = 0xd00d_feed;
pub const FDT_BEGIN_NODE: u32 = 0x0000_0001;
/// `struct fdt_header`: ten big-endian words.
pub const FDT_HEADER_SIZE: usize = 40;

const TOTALSIZE_OFFSET: usize = 4;
const OFF_DT_STRUCT_OFFSET: usize = 8;

/// Returns the offset of the first plausible device tree in `buf`.
///
/// A candidate needs the FDT magic, a `totalsize` and `off_dt_struct`
/// that stay inside `buf`, and a structure block opening with
/// `FDT_BEGIN_NODE`.
pub fn find_dtb_offset(buf: &[u8]) -> Option<usize> {
    let mut off = 0;
    while off + FDT_HEADER_SIZE < buf.len() {
        if is_valid_fdt(&buf[off..]) {
            return Some(off);
        }
        off += 1;
    }
    None
}

fn is_valid_fdt(candidate: &[u8]) -> bool {
    if BigEndian::read_u32(candidate) != FDT_MAGIC {
        return false;
    }

    let totalsize = BigEndian::read_u32(&candidate[TOTALSIZE_OFFSET..]) as usize;
    if totalsize > candidate.len() {
        return false;
    }

    let off_dt_struct = BigEndian::read_u32(&candidate[OFF_DT_STRUCT_OFFSET..]) as usize;
    match candidate.get(off_dt_struct..off_dt_struct.saturating_add(4)) {
        Some(tag) => BigEndian::read_u32(tag) == FDT_BEGIN_NODE,
        None => false,
    }
}
