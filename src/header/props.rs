//! `key=value` text form of the editable header fields.
//!
//! Recognized keys are `page_size`, `name`, `cmdline`, `os_version` and
//! `os_patch_level`. Anything else is ignored when the text is applied.

use alloc::format;
use alloc::string::String;
use log::warn;

use super::{c_str, HeaderKind, HeaderTrait};

impl HeaderKind {
    /// Renders the editable fields, one `key=value` per line.
    pub fn to_props(&self) -> String {
        let mut text = format!("page_size={}\n", self.page_size());
        if let Some(name) = self.board_name() {
            text.push_str(&format!("name={}\n", String::from_utf8_lossy(c_str(name))));
        }
        text.push_str(&format!("cmdline={}\n", self.full_cmdline()));
        if let Some(os_version) = self.os_version().filter(|v| !v.is_empty()) {
            text.push_str(&format!("os_version={}\n", os_version.version_string()));
            text.push_str(&format!("os_patch_level={}\n", os_version.patch_level_string()));
        }
        text
    }

    /// Writes the fields found in `text` back into the header.
    pub fn apply_props(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "page_size" => match value.trim().parse() {
                    Ok(page_size) => {
                        self.set_page_size(page_size);
                    }
                    Err(_) => warn!("Ignoring bad page_size '{value}'"),
                },
                "name" => self.apply_name(value.as_bytes()),
                "cmdline" => self.apply_cmdline(value.as_bytes()),
                "os_version" => {
                    if let (Some(current), Some((major, minor, patch))) =
                        (self.os_version(), super::OsVersion::parse_version(value))
                    {
                        self.set_os_version(current.with_version(major, minor, patch));
                    }
                }
                "os_patch_level" => {
                    if let (Some(current), Some((year, month))) =
                        (self.os_version(), super::OsVersion::parse_patch_level(value))
                    {
                        self.set_os_version(current.with_patch_level(year, month));
                    }
                }
                _ => {}
            }
        }
    }

    fn apply_name(&mut self, value: &[u8]) {
        if let Some(name) = self.board_name_mut() {
            name.fill(0);
            // Keep the trailing NUL.
            let len = value.len().min(name.len() - 1);
            name[..len].copy_from_slice(&value[..len]);
        }
    }

    /// Fills the main command line region first and spills the rest into
    /// the extra region.
    fn apply_cmdline(&mut self, value: &[u8]) {
        let main_len = match self.cmdline_mut() {
            Some(main) => {
                main.fill(0);
                let len = value.len().min(main.len());
                main[..len].copy_from_slice(&value[..len]);
                len
            }
            None => 0,
        };
        if let Some(extra) = self.extra_cmdline_mut() {
            extra.fill(0);
            let rest = &value[main_len..];
            let len = rest.len().min(extra.len());
            extra[..len].copy_from_slice(&rest[..len]);
        }
    }
}
