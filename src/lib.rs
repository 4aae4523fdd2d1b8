//! Library for dissecting and rebuilding Android boot images (including
//! Samsung PXA, MediaTek, ChromeOS and a few OEM wrapped variants).
//!
//! The header and layout code is `no_std`; unpacking, repacking and the
//! compression codecs need the `std` feature.
#![cfg_attr(not(feature = "std"), no_std)]
#![deny(
    // warnings,
    unused_imports,
    missing_debug_implementations,
    // missing_docs,
    clippy::all,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications,
    variant_size_differences
)]

extern crate alloc;

pub mod container;
pub mod dtb;
pub mod errors;
pub mod format;
pub mod header;
pub mod image;
pub mod mtk;

#[cfg(feature = "std")]
pub mod compress;
#[cfg(feature = "std")]
pub mod repack;
#[cfg(feature = "std")]
pub mod unpack;

pub use container::ContainerFormat;
pub use errors::ParseError;
pub use format::Format;
pub use header::{HeaderKind, HeaderTrait};
pub use image::{Block, ImageFlags, ImageLayout};

#[cfg(feature = "std")]
pub use errors::{Error, Result};
#[cfg(feature = "std")]
pub use image::BootImage;
#[cfg(feature = "std")]
pub use repack::{repack, RepackOptions};
#[cfg(feature = "std")]
pub use unpack::{split_image_dtb, unpack, UnpackOptions, UnpackStatus};
