use crate::commands::FlashCommand;
use crate::config::ConnectionParameters;
use crate::error::Error;
use crate::logging::{log_failure, log_output, log_success};
use crate::types::{ImageName, FLASH_DEVICE, LOCAL_DUMPS_DIR, REMOTE_RESTORE_PATH};
use crate::Result;
use rustrc::client::{Client, CommandOutput, Config, Transfer};

use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// What a successful run left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Local copy of the firmware dump.
    pub dump: PathBuf,
    /// Whether an image was written back to flash.
    pub restored: bool,
}

/// Runs the backup and optional restore against one device.
pub struct Orchestrator {
    dumps_dir: PathBuf,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(LOCAL_DUMPS_DIR)
    }
}

impl Orchestrator {
    pub fn new<P: Into<PathBuf>>(dumps_dir: P) -> Self {
        Self {
            dumps_dir: dumps_dir.into(),
        }
    }

    pub async fn run(&self, params: &ConnectionParameters) -> Result<Outcome> {
        if params.host.trim().is_empty() {
            return Err(Error::Usage(
                "Host is a required parameter and can't be empty.".to_string(),
            ));
        }

        info!(
            "Connecting to {}@{}:{}",
            params.user, params.host, params.port
        );
        let config = params.ssh_config().await.map_err(Error::Connection)?;

        self.run_with(config, params.restore.as_deref()).await
    }

    /// Open both sessions, run every step, then close both sessions whatever happened.
    pub async fn run_with<C: Config>(&self, config: C, restore: Option<&Path>) -> Result<Outcome> {
        let mut client = Client::connect(config).await.map_err(Error::Connection)?;

        let mut transfer = match client.open_transfer().await {
            Ok(transfer) => transfer,
            Err(e) => {
                if let Err(close_err) = client.disconnect().await {
                    warn!("Failed to close SSH session: {}", close_err);
                }
                return Err(Error::Connection(e));
            }
        };

        let result = self.run_steps(&client, &transfer, restore).await;

        if let Err(e) = transfer.disconnect().await {
            warn!("Failed to close SFTP session: {}", e);
        }
        if let Err(e) = client.disconnect().await {
            warn!("Failed to close SSH session: {}", e);
        }

        result
    }

    async fn run_steps<C: Config>(
        &self,
        client: &Client<C>,
        transfer: &C::TransferType,
        restore: Option<&Path>,
    ) -> Result<Outcome> {
        let image = ImageName::now();

        info!("Dumping {} to {}", FLASH_DEVICE, image.remote_path());
        exec_checked(client, FlashCommand::Dump { image: &image }).await?;

        tokio::fs::create_dir_all(&self.dumps_dir).await?;

        info!("Downloading {}", image.remote_path());
        let dump = transfer
            .download_file(&image.remote_path(), &self.dumps_dir)
            .await
            .map_err(Error::Download)?;
        log_success("downloaded the image file", dump.display());

        remove_remote_dump(client, &image).await;

        if let Some(path) = restore {
            apply_image(client, transfer, path).await?;
        }

        Ok(Outcome {
            dump,
            restored: restore.is_some(),
        })
    }
}

/// Run a command and turn a non-zero exit into an error carrying its stderr.
async fn exec_checked<C: Config>(
    client: &Client<C>,
    command: FlashCommand<'_>,
) -> Result<CommandOutput> {
    let output = client
        .exec(&command.to_command())
        .await
        .map_err(|e| Error::RemoteCommand {
            step: command.step(),
            status: None,
            stderr: e.to_string(),
        })?;

    log_output(&output);

    if !output.success() {
        return Err(Error::RemoteCommand {
            step: command.step(),
            status: output.status_code,
            stderr: output.stderr_lossy(),
        });
    }

    Ok(output)
}

/// Failures are logged, never returned.
async fn remove_remote_dump<C: Config>(client: &Client<C>, image: &ImageName) {
    let command = FlashCommand::RemoveDump { image };
    match client.exec(&command.to_command()).await {
        Ok(output) if output.success() => debug!("Removed {}", image.remote_path()),
        Ok(output) => warn!(
            "Could not remove {} (status {:?}): {}",
            image.remote_path(),
            output.status_code,
            output.stderr_lossy()
        ),
        Err(e) => log_failure(command.step(), image.remote_path(), &e),
    }
}

async fn apply_image<C: Config>(
    client: &Client<C>,
    transfer: &C::TransferType,
    local: &Path,
) -> Result<()> {
    info!("Uploading original (or modified) file to the target UFiber device...");
    transfer
        .upload_file(local, REMOTE_RESTORE_PATH)
        .await
        .map_err(Error::Upload)?;
    info!("Uploaded!");

    info!("Applying original (or modified) file on the target UFiber device...");
    exec_checked(client, FlashCommand::Restore).await?;
    log_success("applied the image file", local.display());

    Ok(())
}
