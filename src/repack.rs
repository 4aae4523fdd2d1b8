//! Rebuilds a boot image from a template image and artifact files.
//!
//! The output is written strictly front to back. Sizes, MTK sub-headers,
//! the digest and wrapper checksums are patched in afterwards through a
//! writable mapping of the finished file.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use log::{info, warn};
use memmap2::{Mmap, MmapMut};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::compress;
use crate::container::{
    BLOB_HEADER_SIZE, BLOB_SIZE_OFFSET, DHTB_CHECKSUM_OFFSET, DHTB_HEADER_SIZE, DHTB_MAGIC,
    DHTB_SIZE_OFFSET,
};
use crate::errors::{Error, Result};
use crate::format::Format;
use crate::header::{align_padding, Field, HeaderKind, HeaderTrait};
use crate::image::{Block, BootImage, ImageFlags, LG_BUMP_MAGIC, SEANDROID_MAGIC};
use crate::mtk::{self, MTK_HEADER_SIZE};
use crate::unpack::HEADER_FILE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepackOptions {
    /// Store replacement artifacts as-is instead of recompressing them to
    /// the template's formats.
    pub skip_compress: bool,
}

/// Output offsets of the blocks, as needed for patching.
#[derive(Debug, Default)]
struct Offsets {
    header: usize,
    kernel: usize,
    ramdisk: usize,
    second: usize,
    extra: usize,
    dtb: usize,
}

/// Builds `out` from the template image `src` and the artifacts in `dir`.
/// A missing artifact leaves its block empty.
pub fn repack<S, O, D>(src: S, out: O, dir: D, options: &RepackOptions) -> Result<()>
where
    S: AsRef<Path>,
    O: AsRef<Path>,
    D: AsRef<Path>,
{
    let (out, dir) = (out.as_ref(), dir.as_ref());
    let image = BootImage::open(src)?;
    let layout = image.layout();
    let flags = image.flags();
    info!("Repack to boot image: [{}]", out.display());

    let mut header = layout.header().clone();
    for field in Block::ALL.iter().filter_map(|block| block.size_field()) {
        header.set(field, 0);
    }

    let header_path = dir.join(HEADER_FILE);
    if header_path.exists() {
        let text = std::fs::read_to_string(&header_path).map_err(Error::io(&header_path))?;
        header.apply_props(&text);
    }

    let mut writer = ImageWriter::create(out, header.page_size() as usize)?;
    let mut offsets = Offsets::default();

    if flags.contains(ImageFlags::DHTB) {
        writer.write_zeros(DHTB_HEADER_SIZE)?;
    } else if !layout.preamble().is_empty() {
        writer.write_all(&image.as_bytes()[layout.preamble()])?;
    }

    offsets.header = writer.start_header();
    let space = header.header_space();
    let template = &image.as_bytes()[layout.header_offset()..];
    let copied = space.min(template.len());
    writer.write_all(&template[..copied])?;
    writer.write_zeros(space - copied)?;

    offsets.kernel = writer.pos();
    if let Some(mtk) = image.mtk_header(Block::Kernel) {
        writer.write_all(mtk.as_bytes())?;
    }
    let mut kernel_size = write_artifact(&mut writer, &header, dir, Block::Kernel, &image, options)?;
    kernel_size += write_artifact(&mut writer, &header, dir, Block::KernelDtb, &image, options)?;
    header.set(Field::KernelSize, kernel_size as u32);
    writer.align()?;

    offsets.ramdisk = writer.pos();
    if let Some(mtk) = image.mtk_header(Block::Ramdisk) {
        writer.write_all(mtk.as_bytes())?;
    }
    let size = write_artifact(&mut writer, &header, dir, Block::Ramdisk, &image, options)?;
    header.set(Field::RamdiskSize, size as u32);
    writer.align()?;

    offsets.second = writer.pos();
    let size = write_artifact(&mut writer, &header, dir, Block::Second, &image, options)?;
    header.set(Field::SecondSize, size as u32);
    writer.align()?;

    offsets.extra = writer.pos();
    let size = write_artifact(&mut writer, &header, dir, Block::Extra, &image, options)?;
    header.set(Field::ExtraSize, size as u32);
    writer.align()?;

    let recovery_dtbo_offset = writer.pos();
    let size = write_artifact(&mut writer, &header, dir, Block::RecoveryDtbo, &image, options)?;
    if size > 0 {
        header.set_recovery_dtbo_offset(recovery_dtbo_offset as u64);
    }
    header.set(Field::RecoveryDtboSize, size as u32);
    writer.align()?;

    offsets.dtb = writer.pos();
    let size = write_artifact(&mut writer, &header, dir, Block::Dtb, &image, options)?;
    header.set(Field::DtbSize, size as u32);
    writer.align()?;

    if flags.contains(ImageFlags::SEANDROID) {
        writer.write_all(SEANDROID_MAGIC)?;
        writer.write_all(&[0xff; 4])?;
    }
    if flags.contains(ImageFlags::LG_BUMP) {
        writer.write_all(LG_BUMP_MAGIC)?;
    }

    // Loaders may reject images smaller than the original. ChromeOS images
    // still go through external signing.
    if !flags.contains(ImageFlags::CHROMEOS) && writer.pos() < layout.total_size() {
        writer.write_zeros(layout.total_size() - writer.pos())?;
    }
    writer.finish()?;
    drop(image);

    patch_output(out, header, flags, &offsets)
}

/// Second pass over the finished file: everything that depends on final
/// sizes or on the written bytes themselves.
fn patch_output(out: &Path, mut header: HeaderKind, flags: ImageFlags, offsets: &Offsets) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(out)
        .map_err(Error::io(out))?;
    // SAFETY: nothing else touches the freshly written output while mapped.
    let mut map = unsafe { MmapMut::map_mut(&file) }.map_err(Error::io(out))?;

    for (block, field, offset) in [
        (ImageFlags::MTK_KERNEL, Field::KernelSize, offsets.kernel),
        (ImageFlags::MTK_RAMDISK, Field::RamdiskSize, offsets.ramdisk),
    ] {
        if flags.contains(block) {
            let size = header.get(field).unwrap_or(0);
            mtk::set_size(&mut map[offset..], size);
            header.set(field, size + MTK_HEADER_SIZE as u32);
        }
    }

    header.sync_header_size();

    if header.id().is_some() {
        let digest = if flags.contains(ImageFlags::SHA256) {
            block_digest::<Sha256>(&map, &header, offsets)
        } else {
            block_digest::<Sha1>(&map, &header, offsets)
        };
        if let Some(id) = header.id_mut() {
            id.fill(0);
            id[..digest.len()].copy_from_slice(&digest);
        }
    }

    for (key, value) in header.summary() {
        info!("{key:<15} [{value}]");
    }

    let mut slot = &mut map[offsets.header..];
    header.write_to(&mut slot).map_err(Error::io(out))?;

    if flags.contains(ImageFlags::DHTB) {
        let size = map.len() - DHTB_HEADER_SIZE;
        map[..DHTB_MAGIC.len()].copy_from_slice(DHTB_MAGIC);
        LittleEndian::write_u32(&mut map[DHTB_SIZE_OFFSET..], size as u32);
        let checksum = Sha256::digest(&map[DHTB_HEADER_SIZE..]);
        map[DHTB_CHECKSUM_OFFSET..DHTB_CHECKSUM_OFFSET + checksum.len()].copy_from_slice(&checksum);
    } else if flags.contains(ImageFlags::BLOB) {
        let size = map.len() - BLOB_HEADER_SIZE;
        LittleEndian::write_u32(&mut map[BLOB_SIZE_OFFSET..], size as u32);
    }

    map.flush().map_err(Error::io(out))
}

/// Hashes each block followed by its size as a little-endian `u32`. Extra
/// only counts when present; recovery DTBO and DTB only exist from header
/// version 1 and 2 on.
fn block_digest<D: Digest>(map: &[u8], header: &HeaderKind, offsets: &Offsets) -> Vec<u8> {
    let mut ctx = D::new();
    let mut feed = |offset: usize, size: u32| {
        if size > 0 {
            ctx.update(&map[offset..offset + size as usize]);
        }
        ctx.update(size.to_le_bytes());
    };

    feed(offsets.kernel, header.kernel_size().unwrap_or(0));
    feed(offsets.ramdisk, header.ramdisk_size().unwrap_or(0));
    feed(offsets.second, header.second_size().unwrap_or(0));
    if let Some(size) = header.extra_size().filter(|&size| size > 0) {
        feed(offsets.extra, size);
    }
    let version = header.header_version();
    if version == 1 || version == 2 {
        let offset = header.recovery_dtbo_offset().unwrap_or(0) as usize;
        feed(offset, header.recovery_dtbo_size().unwrap_or(0));
    }
    if version == 2 {
        feed(offsets.dtb, header.dtb_size().unwrap_or(0));
    }

    ctx.finalize().to_vec()
}

/// Copies (or recompresses) the artifact for `block` into the output and
/// returns the number of bytes written. Missing artifacts write nothing.
fn write_artifact(
    writer: &mut ImageWriter,
    header: &HeaderKind,
    dir: &Path,
    block: Block,
    image: &BootImage,
    options: &RepackOptions,
) -> Result<usize> {
    let path = dir.join(block.file_name());
    if !path.exists() {
        return Ok(0);
    }
    let has_field = match block.size_field() {
        Some(field) => header.get(field).is_some(),
        None => header.kernel_size().is_some(),
    };
    if !has_field {
        warn!("{} has no {block} block, ignoring [{}]", header.name(), path.display());
        return Ok(0);
    }

    let file = File::open(&path).map_err(Error::io(&path))?;
    let len = file.metadata().map_err(Error::io(&path))?.len();
    if len == 0 {
        return Ok(0);
    }
    // SAFETY: artifacts are not modified while repacking.
    let raw = unsafe { Mmap::map(&file) }.map_err(Error::io(&path))?;

    let format = image.layout().format(block);
    let written = if block.is_compressible()
        && !options.skip_compress
        && !Format::detect(&raw).is_compressed_any()
        && format.is_compressed()
    {
        writer.encode(format, &raw)?
    } else {
        writer.write_all(&raw)?
    };
    info!("Packed {block} [{written}]");
    Ok(written)
}

/// Buffered output that tracks its position and aligns blocks relative to
/// the start of the header.
struct ImageWriter {
    out: BufWriter<File>,
    path: PathBuf,
    pos: usize,
    header_start: usize,
    page_size: usize,
}

impl ImageWriter {
    fn create(path: &Path, page_size: usize) -> Result<Self> {
        let file = File::create(path).map_err(Error::io(path))?;
        Ok(ImageWriter {
            out: BufWriter::new(file),
            path: path.to_path_buf(),
            pos: 0,
            header_start: 0,
            page_size,
        })
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn start_header(&mut self) -> usize {
        self.header_start = self.pos;
        self.pos
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<usize> {
        self.out.write_all(buf).map_err(Error::io(&self.path))?;
        self.pos += buf.len();
        Ok(buf.len())
    }

    fn write_zeros(&mut self, len: usize) -> Result<()> {
        let written = io::copy(&mut io::repeat(0).take(len as u64), &mut self.out)
            .map_err(Error::io(&self.path))?;
        self.pos += written as usize;
        Ok(())
    }

    fn encode(&mut self, format: Format, src: &[u8]) -> Result<usize> {
        let written = compress::encode(format, src, &mut self.out)? as usize;
        self.pos += written;
        Ok(written)
    }

    fn align(&mut self) -> Result<()> {
        self.write_zeros(align_padding(self.pos - self.header_start, self.page_size))
    }

    fn finish(self) -> Result<()> {
        let file = self
            .out
            .into_inner()
            .map_err(|e| Error::io(&self.path)(e.into_error()))?;
        file.sync_all().map_err(Error::io(&self.path))
    }
}
