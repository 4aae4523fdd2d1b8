use std::fs::File;
use std::path::Path;

use log::info;
use memmap2::Mmap;

use super::{Block, ImageFlags, ImageLayout};
use crate::errors::{Error, Result};
use crate::header::HeaderKind;
use crate::mtk::MtkHeader;

/// A boot image file mapped read-only, together with its parsed layout.
#[derive(Debug)]
pub struct BootImage {
    map: Mmap,
    layout: ImageLayout,
}

impl BootImage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Parsing boot image: [{}]", path.display());

        let file = File::open(path).map_err(Error::io(path))?;
        // SAFETY: the mapping is only read, and only while `self` lives.
        let map = unsafe { Mmap::map(&file) }.map_err(Error::io(path))?;
        let layout = ImageLayout::parse(&map)?;
        Ok(BootImage { map, layout })
    }

    pub fn layout(&self) -> &ImageLayout {
        &self.layout
    }

    pub fn header(&self) -> &HeaderKind {
        self.layout.header()
    }

    pub fn flags(&self) -> ImageFlags {
        self.layout.flags()
    }

    /// Payload bytes of `block`, without any MTK sub-header.
    pub fn block(&self, block: Block) -> &[u8] {
        &self.map[self.layout.range(block)]
    }

    pub fn mtk_header(&self, block: Block) -> Option<MtkHeader<'_>> {
        self.layout
            .mtk_range(block)
            .and_then(|range| MtkHeader::parse(&self.map[range]))
    }

    /// The whole mapped file.
    pub fn as_bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
