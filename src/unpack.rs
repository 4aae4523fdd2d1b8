//! Splits a boot image into per-block artifact files.

use std::fs::{self, File};
use std::path::Path;

use log::{info, warn};
use memmap2::Mmap;

use crate::compress;
use crate::dtb::find_dtb_offset;
use crate::errors::{Error, Result};
use crate::format::Format;
use crate::image::{Block, BootImage, ImageFlags};

/// Artifact holding the editable header fields as `key=value` lines.
pub const HEADER_FILE: &str = "header";
pub const KERNEL_FILE: &str = "kernel";
pub const KERNEL_DTB_FILE: &str = "kernel_dtb";
pub const RAMDISK_FILE: &str = "ramdisk.cpio";
pub const SECOND_FILE: &str = "second";
pub const EXTRA_FILE: &str = "extra";
pub const RECOVERY_DTBO_FILE: &str = "recovery_dtbo";
pub const DTB_FILE: &str = "dtb";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpackOptions {
    /// Write kernel, ramdisk and extra exactly as stored.
    pub skip_decompress: bool,
    /// Also write the [`HEADER_FILE`] artifact.
    pub dump_header: bool,
}

/// How an unpack finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackStatus {
    Done,
    /// The image was ChromeOS wrapped; a repacked image has to be signed
    /// with external tooling.
    NeedsSigning,
}

/// Writes every non-empty block of `image` into `dir`.
pub fn unpack<P: AsRef<Path>, D: AsRef<Path>>(
    image: P,
    dir: D,
    options: &UnpackOptions,
) -> Result<UnpackStatus> {
    let image = BootImage::open(image)?;
    let dir = dir.as_ref();

    if options.dump_header {
        let path = dir.join(HEADER_FILE);
        fs::write(&path, image.header().to_props()).map_err(Error::io(&path))?;
    }

    for block in Block::ALL {
        let data = image.block(block);
        if data.is_empty() {
            continue;
        }

        let path = dir.join(block.file_name());
        let format = image.layout().format(block);
        if block.is_compressible() && !options.skip_decompress && format.is_compressed() {
            decode_to_file(format, data, &path)?;
        } else {
            fs::write(&path, data).map_err(Error::io(&path))?;
        }
        info!("Unpacked {block} [{}]", path.display());
    }

    if image.flags().contains(ImageFlags::CHROMEOS) {
        Ok(UnpackStatus::NeedsSigning)
    } else {
        Ok(UnpackStatus::Done)
    }
}

/// Splits a standalone kernel image with an appended device tree into the
/// [`KERNEL_FILE`] and [`KERNEL_DTB_FILE`] artifacts.
///
/// Returns `false` when no device tree follows the kernel.
pub fn split_image_dtb<P: AsRef<Path>, D: AsRef<Path>>(
    kernel: P,
    dir: D,
    skip_decompress: bool,
) -> Result<bool> {
    let kernel = kernel.as_ref();
    let dir = dir.as_ref();

    let file = File::open(kernel).map_err(Error::io(kernel))?;
    // SAFETY: read-only mapping dropped before returning.
    let map = unsafe { Mmap::map(&file) }.map_err(Error::io(kernel))?;

    let Some(dtb_off) = find_dtb_offset(&map).filter(|&off| off > 0) else {
        warn!("Cannot find DTB in {}", kernel.display());
        return Ok(false);
    };

    let (image, dtb) = map.split_at(dtb_off);
    let format = Format::detect_lg(image);
    let kernel_path = dir.join(KERNEL_FILE);
    if !skip_decompress && format.is_compressed() {
        decode_to_file(format, image, &kernel_path)?;
    } else {
        fs::write(&kernel_path, image).map_err(Error::io(&kernel_path))?;
    }

    let dtb_path = dir.join(KERNEL_DTB_FILE);
    fs::write(&dtb_path, dtb).map_err(Error::io(&dtb_path))?;
    info!("Split {} at {dtb_off:#x}", kernel.display());
    Ok(true)
}

fn decode_to_file(format: Format, data: &[u8], path: &Path) -> Result<()> {
    compress::write_file(path, |out| compress::decode(format, data, out))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_match_blocks() {
        assert_eq!(Block::Kernel.file_name(), KERNEL_FILE);
        assert_eq!(Block::KernelDtb.file_name(), KERNEL_DTB_FILE);
        assert_eq!(Block::Ramdisk.file_name(), RAMDISK_FILE);
        assert_eq!(Block::Second.file_name(), SECOND_FILE);
        assert_eq!(Block::Extra.file_name(), EXTRA_FILE);
        assert_eq!(Block::RecoveryDtbo.file_name(), RECOVERY_DTBO_FILE);
        assert_eq!(Block::Dtb.file_name(), DTB_FILE);
    }
}
