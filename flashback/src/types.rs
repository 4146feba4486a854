use chrono::{DateTime, Utc};
use std::fmt;

/// Raw flash partition holding the firmware image.
pub const FLASH_DEVICE: &str = "/dev/mtdblock9";

/// Scratch directory on the device.
pub const REMOTE_TMP_DIR: &str = "/tmp";

/// Where an image to restore is staged before being written to flash.
pub const REMOTE_RESTORE_PATH: &str = "/tmp/flash.bin";

/// Local directory dumps are saved into, relative to the working directory.
pub const LOCAL_DUMPS_DIR: &str = "./dumps";

const IMAGE_NAME_FORMAT: &str = "fw-%d%m%Y-%H%M%S.bin";

/// File name of a firmware dump, derived from the UTC time it was taken.
///
/// Hours use the 24-hour clock (`fw-01022024-150405.bin` for 15:04:05), so
/// names differ from those of tools that print a 12-hour hour without AM/PM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageName(String);

impl ImageName {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp.format(IMAGE_NAME_FORMAT).to_string())
    }

    /// Parse a name back into the time it encodes.
    pub fn timestamp(name: &str) -> Option<DateTime<Utc>> {
        chrono::NaiveDateTime::parse_from_str(name, IMAGE_NAME_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the temporary copy on the device.
    pub fn remote_path(&self) -> String {
        format!("{}/{}", REMOTE_TMP_DIR, self.0)
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
