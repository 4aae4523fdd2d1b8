//! Streaming codecs for the payload formats found in boot images.
//!
//! Both directions read a whole input slice and stream into a writer,
//! returning the number of bytes written.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info};
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use xz2::read::XzDecoder;
use xz2::stream::{Check, LzmaOptions, Stream};
use xz2::write::XzEncoder;

use crate::errors::{Error, Result};
use crate::format::{Format, LZ4_LEG_MAGIC};

/// Uncompressed bytes per legacy LZ4 block.
pub const LZ4_LEGACY_BLOCK_SIZE: usize = 0x80_0000;

/// Decompresses `src`, which must be in `format`, into `dst`.
pub fn decode<W: Write>(format: Format, src: &[u8], dst: W) -> Result<u64> {
    let mut dst = CountingWriter::new(dst);
    let result = match format {
        Format::Gzip | Format::Zopfli => io::copy(&mut MultiGzDecoder::new(src), &mut dst),
        Format::Xz => io::copy(&mut XzDecoder::new(src), &mut dst),
        Format::Lzma => Stream::new_lzma_decoder(u64::MAX)
            .map_err(io::Error::from)
            .and_then(|stream| io::copy(&mut XzDecoder::new_stream(src, stream), &mut dst)),
        Format::Bzip2 => io::copy(&mut BzDecoder::new(src), &mut dst),
        Format::Lz4 => io::copy(&mut FrameDecoder::new(src), &mut dst),
        Format::Lz4Legacy | Format::Lz4Lg => decode_lz4_legacy(src, &mut dst),
        _ => return Err(Error::UnsupportedCodec(format)),
    };
    result.map_err(|source| Error::Codec { format, source })?;
    dst.flush().map_err(|source| Error::Codec { format, source })?;

    debug!("{format} decoded: {} -> {} bytes", src.len(), dst.count);
    Ok(dst.count)
}

/// Compresses `src` into `dst` as `format`.
pub fn encode<W: Write>(format: Format, src: &[u8], dst: W) -> Result<u64> {
    if !format.is_compressed() {
        return Err(Error::UnsupportedCodec(format));
    }
    let mut dst = CountingWriter::new(dst);
    encode_into(format, src, &mut dst).map_err(|source| Error::Codec { format, source })?;

    debug!("{format} encoded: {} -> {} bytes", src.len(), dst.count);
    Ok(dst.count)
}

fn encode_into<W: Write>(format: Format, src: &[u8], dst: &mut W) -> io::Result<()> {
    match format {
        // No zopfli encoder around; best-level deflate stays gzip compatible.
        Format::Gzip | Format::Zopfli => {
            let mut encoder = GzEncoder::new(dst, Compression::best());
            encoder.write_all(src)?;
            encoder.finish()?;
        }
        Format::Xz => {
            // The kernel's xz decoder only understands CRC32.
            let stream = Stream::new_easy_encoder(9, Check::Crc32)?;
            let mut encoder = XzEncoder::new_stream(dst, stream);
            encoder.write_all(src)?;
            encoder.finish()?;
        }
        Format::Lzma => {
            let options = LzmaOptions::new_preset(9)?;
            let stream = Stream::new_lzma_encoder(&options)?;
            let mut encoder = XzEncoder::new_stream(dst, stream);
            encoder.write_all(src)?;
            encoder.finish()?;
        }
        Format::Bzip2 => {
            let mut encoder = BzEncoder::new(dst, bzip2::Compression::best());
            encoder.write_all(src)?;
            encoder.finish()?;
        }
        Format::Lz4 => {
            let mut encoder = FrameEncoder::new(dst);
            encoder.write_all(src)?;
            encoder
                .finish()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        Format::Lz4Legacy | Format::Lz4Lg => {
            encode_lz4_legacy(src, dst, format == Format::Lz4Lg)?;
        }
        _ => unreachable!("{format} has no encoder"),
    }
    Ok(())
}

/// Legacy LZ4: the magic, then `(u32 size, block)` pairs. Streams may be
/// concatenated, and LG images end with the total uncompressed size.
fn decode_lz4_legacy<W: Write>(src: &[u8], dst: &mut W) -> io::Result<u64> {
    let invalid = |msg: &str| io::Error::new(io::ErrorKind::InvalidData, msg.to_owned());
    if !src.starts_with(LZ4_LEG_MAGIC) {
        return Err(invalid("missing legacy lz4 magic"));
    }

    let mut out = vec![0u8; LZ4_LEGACY_BLOCK_SIZE];
    let mut total = 0u64;
    let mut off = LZ4_LEG_MAGIC.len();
    while off + 4 <= src.len() {
        let block_size = LittleEndian::read_u32(&src[off..]) as usize;
        off += 4;
        if src[off - 4..off] == *LZ4_LEG_MAGIC {
            continue;
        }
        if block_size > src.len() - off {
            // LG size trailer.
            break;
        }

        let block = &src[off..off + block_size];
        let len = lz4_flex::block::decompress_into(block, &mut out)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        dst.write_all(&out[..len])?;
        total += len as u64;
        off += block_size;
    }
    Ok(total)
}

fn encode_lz4_legacy<W: Write>(src: &[u8], dst: &mut W, lg: bool) -> io::Result<()> {
    dst.write_all(LZ4_LEG_MAGIC)?;
    for chunk in src.chunks(LZ4_LEGACY_BLOCK_SIZE) {
        let block = lz4_flex::block::compress(chunk);
        dst.write_all(&(block.len() as u32).to_le_bytes())?;
        dst.write_all(&block)?;
    }
    if lg {
        dst.write_all(&(src.len() as u32).to_le_bytes())?;
    }
    Ok(())
}

struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        CountingWriter { inner, count: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reads all of `src` through `format`'s decoder into a new buffer.
pub fn decode_to_vec(format: Format, src: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decode(format, src, &mut out)?;
    Ok(out)
}

/// Compresses `src` into a new buffer.
pub fn encode_to_vec(format: Format, src: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode(format, src, &mut out)?;
    Ok(out)
}

/// Compresses the file at `src` as `format`. Without `dst` the output lands
/// next to `src` with [`Format::ext`] appended.
pub fn compress_file(format: Format, src: &Path, dst: Option<&Path>) -> Result<PathBuf> {
    if !format.is_compressed() {
        return Err(Error::UnsupportedCodec(format));
    }
    let dst = dst.map_or_else(|| with_suffix(src, format.ext()), Path::to_path_buf);
    let data = fs::read(src).map_err(Error::io(src))?;
    write_file(&dst, |out| encode(format, &data, out))?;
    info!("Compressed [{}] as {format} [{}]", src.display(), dst.display());
    Ok(dst)
}

/// Decompresses the file at `src` in whatever format it is in. Without
/// `dst` the format's extension is stripped from the name, or `.raw` is
/// appended when the name does not carry it.
pub fn decompress_file(src: &Path, dst: Option<&Path>) -> Result<(Format, PathBuf)> {
    let data = fs::read(src).map_err(Error::io(src))?;
    let format = Format::detect_lg(&data);
    if !format.is_compressed() {
        return Err(Error::UnsupportedCodec(format));
    }
    let dst = match dst {
        Some(dst) => dst.to_path_buf(),
        None => strip_suffix(src, format.ext()).unwrap_or_else(|| with_suffix(src, ".raw")),
    };
    write_file(&dst, |out| decode(format, &data, out))?;
    info!("Decompressed {format} [{}] to [{}]", src.display(), dst.display());
    Ok((format, dst))
}

/// Creates `path` and hands a buffered writer for it to `fill`.
pub(crate) fn write_file<F>(path: &Path, fill: F) -> Result<u64>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<u64>,
{
    let file = File::create(path).map_err(Error::io(path))?;
    let mut out = BufWriter::new(file);
    let written = fill(&mut out)?;
    out.flush().map_err(Error::io(path))?;
    Ok(written)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn strip_suffix(path: &Path, suffix: &str) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(suffix).filter(|stem| !stem.is_empty())?;
    Some(path.with_file_name(stem))
}
