#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use bootimg::header::{align_to, Field, HeaderTrait};
use tempfile::TempDir;

/// Lays `header` and `blocks` out page by page, the way mkbootimg does.
/// Blocks must be given in on-disk order.
pub fn build_image<H: HeaderTrait>(mut header: H, blocks: &[(Field, &[u8])]) -> Vec<u8> {
    for (field, data) in blocks {
        assert!(header.set(*field, data.len() as u32), "{field:?} not in layout");
    }
    let page = header.page_size() as usize;
    let mut image = header.as_bytes().to_vec();
    image.resize(header.header_space(), 0);
    for (_, data) in blocks {
        image.extend_from_slice(data);
        image.resize(align_to(image.len(), page), 0);
    }
    image
}

/// Smallest well-formed flattened device tree.
pub fn tiny_fdt() -> Vec<u8> {
    let mut fdt = Vec::new();
    for word in [0xd00d_feedu32, 72, 56, 72, 40, 17, 16, 0, 0, 16] {
        fdt.extend_from_slice(&word.to_be_bytes());
    }
    fdt.extend_from_slice(&[0u8; 16]);
    for word in [1u32, 0, 2, 9] {
        fdt.extend_from_slice(&word.to_be_bytes());
    }
    fdt
}

/// 512 byte MTK sub-header.
pub fn mtk_header(name: &[u8], size: u32) -> Vec<u8> {
    let mut raw = vec![0u8; 512];
    raw[..4].copy_from_slice(b"\x88\x16\x88\x58");
    raw[4..8].copy_from_slice(&size.to_le_bytes());
    raw[8..8 + name.len()].copy_from_slice(name);
    raw
}

/// Something that compresses well and is not mistaken for any magic.
pub fn text_payload(lines: usize) -> Vec<u8> {
    (0..lines)
        .flat_map(|i| format!("payload line {i}\n").into_bytes())
        .collect()
}

/// A scratch directory with the source image written into it and an
/// `out/` directory for artifacts.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new(image: &[u8]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("boot.img"), image).unwrap();
        fs::create_dir(dir.path().join("out")).unwrap();
        Workspace { dir }
    }

    pub fn image(&self) -> PathBuf {
        self.dir.path().join("boot.img")
    }

    pub fn artifacts(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn artifact(&self, name: &str) -> PathBuf {
        self.artifacts().join(name)
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

pub fn read(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap()
}
