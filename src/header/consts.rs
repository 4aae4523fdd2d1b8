pub use self::android::*;
pub use self::samsung::*;
pub use self::vendor::*;

mod android {
    pub const BOOT_MAGIC: [u8; BOOT_MAGIC_SIZE] = *b"ANDROID!";
    pub const BOOT_MAGIC_SIZE: usize = 8;
    pub const BOOT_NAME_SIZE: usize = 16;
    pub const BOOT_ARGS_SIZE: usize = 512;
    pub const BOOT_EXTRA_ARGS_SIZE: usize = 1024;
    pub const BOOT_ID_SIZE: usize = 32;

    /// Header v3 images always use 4K pages, the page size is not stored.
    pub const BOOT_V3_PAGE_SIZE: u32 = 4096;

    pub const AOSP_V0_HEADER_SIZE: usize = 1632;
    pub const AOSP_V1_HEADER_SIZE: usize = 1648;
    pub const AOSP_V2_HEADER_SIZE: usize = 1660;
    pub const AOSP_V3_HEADER_SIZE: usize = 1580;

    /// Offset of the shared `page_size` slot in v0-v2 layouts. Samsung PXA
    /// headers keep an unrelated (and unrealistically large) value here.
    pub const PAGE_SIZE_OFFSET: usize = 36;
    /// Offset of `header_version` in v0-v2 layouts (`extra_size` in v0).
    pub const HEADER_VERSION_OFFSET: usize = 40;
    pub const NAME_OFFSET: usize = 48;
    pub const CMDLINE_OFFSET: usize = 64;

    /// Raw page size values at or above this select the PXA layout.
    pub const PXA_PAGE_SIZE_THRESHOLD: u32 = 0x0200_0000;
}

mod samsung {
    pub const PXA_HEADER_SIZE: usize = 1640;
    pub const PXA_NAME_SIZE: usize = 24;
}

mod vendor {
    pub const VENDOR_BOOT_MAGIC: [u8; VENDOR_BOOT_MAGIC_SIZE] = *b"VNDRBOOT";
    pub const VENDOR_BOOT_MAGIC_SIZE: usize = 8;
    pub const VENDOR_BOOT_ARGS_SIZE: usize = 2048;
    pub const VENDOR_V3_HEADER_SIZE: usize = 2112;
}

/// Fixed-size preambles placed in front of the real header by OEM loaders.
pub mod oem {
    pub const NOOKHD_RL_MAGIC: &[u8] = b"Red Loader";
    pub const NOOKHD_GL_MAGIC: &[u8] = b"Green Loader";
    pub const NOOKHD_GR_MAGIC: &[u8] = b"Green Recovery";
    pub const NOOKHD_EB_MAGIC: &[u8] = b"eMMC boot.img+secondloader";
    pub const NOOKHD_ER_MAGIC: &[u8] = b"eMMC recovery.img+secondloader";
    pub const NOOKHD_MAGICS: [&[u8]; 5] = [
        NOOKHD_RL_MAGIC,
        NOOKHD_GL_MAGIC,
        NOOKHD_GR_MAGIC,
        NOOKHD_EB_MAGIC,
        NOOKHD_ER_MAGIC,
    ];
    pub const NOOKHD_PRE_HEADER_SIZE: usize = 1024 * 1024;

    pub const ACCLAIM_MAGIC: &[u8] = b"BauwksBoot";
    pub const ACCLAIM_PRE_HEADER_SIZE: usize = 256 * 1024;
}
