//! The fixed set of shell commands ever sent to the device.
//!
//! Nothing from the command line reaches command text: the only variable
//! part is the dump file name, which is generated internally.

use crate::types::{ImageName, FLASH_DEVICE, REMOTE_RESTORE_PATH};
use rustrc::client::Command;
use rustrc::cmd;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashCommand<'a> {
    /// Copy the flash partition into the device's scratch directory.
    Dump { image: &'a ImageName },
    /// Delete the scratch copy of a dump.
    RemoveDump { image: &'a ImageName },
    /// Write the staged image onto flash, then delete it.
    Restore,
}

impl FlashCommand<'_> {
    /// What the command does, phrased to follow "Failed to".
    pub fn step(&self) -> &'static str {
        match self {
            FlashCommand::Dump { .. } => "dump the image file",
            FlashCommand::RemoveDump { .. } => "remove the temporary image file",
            FlashCommand::Restore => "apply the original (or modified) image file",
        }
    }

    pub fn to_command(&self) -> Command {
        match self {
            FlashCommand::Dump { image } => {
                cmd!("cat", FLASH_DEVICE).redirect_stdout(image.remote_path())
            }
            FlashCommand::RemoveDump { image } => cmd!("rm", image.remote_path()),
            FlashCommand::Restore => cmd!(
                "dd",
                format!("if={}", REMOTE_RESTORE_PATH),
                format!("of={}", FLASH_DEVICE)
            )
            .and_then(cmd!("rm", REMOTE_RESTORE_PATH)),
        }
    }
}
