use alloc::format;
use alloc::string::String;

/// Packed `os_version` word.
///
/// For version `A.B.C` and patch level `Y-M`, 7 bits each for A, B and C and
/// 7 bits for `Y - 2000` plus 4 bits for M:
/// `A[31:25] B[24:18] C[17:11] (Y-2000)[10:4] M[3:0]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OsVersion(u32);

const PATCH_LEVEL_BITS: u32 = 11;
const PATCH_LEVEL_MASK: u32 = (1 << PATCH_LEVEL_BITS) - 1;

impl OsVersion {
    pub fn new(major: u32, minor: u32, patch: u32, year: u32, month: u32) -> Self {
        OsVersion(0)
            .with_version(major, minor, patch)
            .with_patch_level(year, month)
    }

    /// True when neither a version nor a patch level is recorded.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// `(major, minor, patch)`.
    pub fn version(&self) -> (u32, u32, u32) {
        let version = self.0 >> PATCH_LEVEL_BITS;
        ((version >> 14) & 0x7f, (version >> 7) & 0x7f, version & 0x7f)
    }

    /// `(year, month)`.
    pub fn patch_level(&self) -> (u32, u32) {
        let level = self.0 & PATCH_LEVEL_MASK;
        ((level >> 4) + 2000, level & 0xf)
    }

    /// Replaces the version, keeping the patch level.
    pub fn with_version(self, major: u32, minor: u32, patch: u32) -> Self {
        let version = ((major & 0x7f) << 14) | ((minor & 0x7f) << 7) | (patch & 0x7f);
        OsVersion((version << PATCH_LEVEL_BITS) | (self.0 & PATCH_LEVEL_MASK))
    }

    /// Replaces the patch level, keeping the version.
    pub fn with_patch_level(self, year: u32, month: u32) -> Self {
        let level = ((year.saturating_sub(2000) & 0x7f) << 4) | (month & 0xf);
        OsVersion((self.0 & !PATCH_LEVEL_MASK) | level)
    }

    pub fn version_string(&self) -> String {
        let (major, minor, patch) = self.version();
        format!("{major}.{minor}.{patch}")
    }

    pub fn patch_level_string(&self) -> String {
        let (year, month) = self.patch_level();
        format!("{year}-{month:02}")
    }

    /// Parses `"A.B.C"`. Missing trailing components count as zero.
    pub fn parse_version(value: &str) -> Option<(u32, u32, u32)> {
        let mut parts = value.trim().splitn(3, '.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        let patch = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        Some((major, minor, patch))
    }

    /// Parses `"YYYY-MM"`.
    pub fn parse_patch_level(value: &str) -> Option<(u32, u32)> {
        let (year, month) = value.trim().split_once('-')?;
        Some((year.parse().ok()?, month.parse().ok()?))
    }
}

impl From<u32> for OsVersion {
    fn from(raw: u32) -> Self {
        OsVersion(raw)
    }
}

impl From<OsVersion> for u32 {
    fn from(version: OsVersion) -> Self {
        version.0
    }
}
