use crate::client::{Command, CommandOutput, Config, Session, Transfer};

use async_trait::async_trait;
use log::{debug, info, warn};
use russh::client;
use russh_keys::key::PrivateKeyWithHashAlg;
use russh_keys::load_secret_key;
use russh_keys::ssh_key::public::PublicKey;
use russh_sftp::client::SftpSession;
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    io::{AsyncRead, AsyncWriteExt},
    net::{lookup_host, ToSocketAddrs},
    time::Duration,
};

/// Extended data stream number SSH uses for stderr.
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

pub struct SSHSession {
    session: client::Handle<Handler>,
}

/// SFTP channel riding on its own SSH connection.
pub struct SftpTransfer {
    session: client::Handle<Handler>,
    sftp: SftpSession,
}

/// Configuration for an SSH session
///
/// SSHConfig::Key is used to authenticate with a private key
/// SSHConfig::Password is used to authenticate with a password
#[derive(Debug, Clone)]
pub enum SSHConfig {
    Key {
        username: String,
        socket: SocketAddr,
        key_path: PathBuf,
        inactivity_timeout: Duration,
    },
    Password {
        username: String,
        socket: SocketAddr,
        password: String,
        inactivity_timeout: Duration,
    },
}

async fn resolve<S: ToSocketAddrs>(socket: S) -> crate::Result<SocketAddr> {
    lookup_host(socket)
        .await
        .map_err(|e| crate::Error::ConnectionError(format!("Error resolving host: {}", e)))?
        .next()
        .ok_or_else(|| crate::Error::ConnectionError("Error Parsing Socket".to_string()))
}

impl SSHConfig {
    pub async fn key<U: Into<String>, S: ToSocketAddrs, P: Into<PathBuf>>(
        username: U,
        socket: S,
        key_path: P,
        inactivity_timeout: Duration,
    ) -> crate::Result<Self> {
        Ok(SSHConfig::Key {
            username: username.into(),
            socket: resolve(socket).await?,
            key_path: key_path.into(),
            inactivity_timeout,
        })
    }

    pub async fn password<U: Into<String>, P: Into<String>, S: ToSocketAddrs>(
        username: U,
        password: P,
        socket: S,
        inactivity_timeout: Duration,
    ) -> crate::Result<Self> {
        Ok(SSHConfig::Password {
            username: username.into(),
            socket: resolve(socket).await?,
            password: password.into(),
            inactivity_timeout,
        })
    }

    pub fn socket(&self) -> SocketAddr {
        match self {
            SSHConfig::Key { socket, .. } | SSHConfig::Password { socket, .. } => *socket,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            SSHConfig::Key { username, .. } | SSHConfig::Password { username, .. } => username,
        }
    }

    /// Open a connection and authenticate it.
    async fn authenticate(&self) -> crate::Result<client::Handle<Handler>> {
        match self {
            SSHConfig::Key {
                key_path,
                inactivity_timeout,
                username,
                socket,
            } => {
                let mut session = get_handle(*socket, *inactivity_timeout).await?;

                let key_pair = load_secret_key(key_path, None)?;
                let auth_res = session
                    .authenticate_publickey(
                        username,
                        PrivateKeyWithHashAlg::new(Arc::new(key_pair), None)?,
                    )
                    .await?;

                if !auth_res {
                    return Err(crate::Error::AuthenticationError(
                        "Failed to authenticate with public key".to_string(),
                    ));
                }

                Ok(session)
            }
            SSHConfig::Password {
                username,
                socket,
                password,
                inactivity_timeout,
            } => {
                let mut session = get_handle(*socket, *inactivity_timeout).await?;

                let auth_res = session.authenticate_password(username, password).await?;

                if !auth_res {
                    return Err(crate::Error::AuthenticationError(
                        "Failed to authenticate with password".to_string(),
                    ));
                }

                Ok(session)
            }
        }
    }
}

impl Session for SSHSession {
    async fn disconnect(&mut self) -> crate::Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "English")
            .await?;
        Ok(())
    }

    /// Execute a command on the remote host
    async fn exec(&self, cmd: &Command) -> crate::Result<CommandOutput> {
        let mut channel = self.session.channel_open_session().await?;

        debug!("exec: {}", cmd);
        let command: Vec<u8> = cmd.into();

        channel.exec(true, command).await?;

        let mut code = None;

        let mut stdout = vec![];
        let mut stderr = vec![];

        while let Some(msg) = channel.wait().await {
            match msg {
                russh::ChannelMsg::Data { ref data } => {
                    stdout.extend_from_slice(data);
                }
                russh::ChannelMsg::ExtendedData { ref data, ext }
                    if ext == SSH_EXTENDED_DATA_STDERR =>
                {
                    stderr.extend_from_slice(data);
                }
                russh::ChannelMsg::ExitStatus { exit_status } => {
                    code = Some(exit_status);
                }
                _ => {}
            }
        }

        finish_exec(cmd, stdout, stderr, code)
    }
}

/// A channel that closes without an exit status did not finish the command.
fn finish_exec(
    cmd: &Command,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    code: Option<u32>,
) -> crate::Result<CommandOutput> {
    if code.is_none() {
        return Err(crate::Error::CommandError(format!(
            "`{}` ended without an exit status",
            cmd
        )));
    }

    Ok(CommandOutput {
        stdout,
        stderr,
        status_code: code,
    })
}

/// Copy `reader` into a new file at `local_path`.
///
/// The file is removed again if anything fails before it is fully flushed.
async fn save_complete<R: AsyncRead + Unpin>(
    reader: &mut R,
    local_path: &Path,
) -> std::io::Result<u64> {
    async fn write<R: AsyncRead + Unpin>(reader: &mut R, local_path: &Path) -> std::io::Result<u64> {
        let mut local_file = tokio::fs::File::create(local_path).await?;
        let copied = tokio::io::copy(reader, &mut local_file).await?;
        local_file.flush().await?;
        Ok(copied)
    }

    match write(reader, local_path).await {
        Ok(copied) => Ok(copied),
        Err(e) => {
            match tokio::fs::remove_file(local_path).await {
                Ok(()) => debug!("Removed partial file {}", local_path.display()),
                Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
                Err(rm) => warn!(
                    "Failed to remove partial file {}: {}",
                    local_path.display(),
                    rm
                ),
            }
            Err(e)
        }
    }
}

impl Transfer for SftpTransfer {
    async fn disconnect(&mut self) -> crate::Result<()> {
        if let Err(e) = self.sftp.close().await {
            warn!("Failed to close SFTP session cleanly: {}", e);
        }
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "English")
            .await?;
        Ok(())
    }

    async fn transfer_file(
        &self,
        file_contents: Arc<Vec<u8>>,
        remote_dest: &str,
    ) -> crate::Result<()> {
        let mut remote_file = self.sftp.create(remote_dest).await.map_err(|e| {
            crate::Error::FileTransferError(format!(
                "Failed to create remote file {}: {}",
                remote_dest, e
            ))
        })?;

        remote_file.write_all(&file_contents).await.map_err(|e| {
            crate::Error::FileTransferError(format!("Failed to write to remote file: {}", e))
        })?;

        remote_file.shutdown().await.map_err(|e| {
            crate::Error::FileTransferError(format!("Failed to close remote file: {}", e))
        })?;

        info!("Uploaded {} bytes to {}", file_contents.len(), remote_dest);
        Ok(())
    }

    async fn download_file(&self, remote_src: &str, local_dir: &Path) -> crate::Result<PathBuf> {
        let file_name = Path::new(remote_src).file_name().ok_or_else(|| {
            crate::Error::FileTransferError(format!("Invalid remote path: {}", remote_src))
        })?;
        let local_path = local_dir.join(file_name);

        let mut remote_file = self.sftp.open(remote_src).await.map_err(|e| {
            crate::Error::FileTransferError(format!(
                "Failed to open remote file {}: {}",
                remote_src, e
            ))
        })?;

        let copied = save_complete(&mut remote_file, &local_path)
            .await
            .map_err(|e| {
                crate::Error::FileTransferError(format!(
                    "Failed to copy {} to {}: {}",
                    remote_src,
                    local_path.display(),
                    e
                ))
            })?;

        info!(
            "Downloaded {} bytes from {} to {}",
            copied,
            remote_src,
            local_path.display()
        );
        Ok(local_path)
    }
}

impl Config for SSHConfig {
    type SessionType = SSHSession;
    type TransferType = SftpTransfer;

    /// Create a new SSH session
    async fn create_session(&self) -> crate::Result<Self::SessionType> {
        let session = self.authenticate().await?;
        info!("SSH session established with {}", self.socket());
        Ok(SSHSession { session })
    }

    /// Create a new SFTP session on a dedicated connection
    async fn create_transfer(&self) -> crate::Result<Self::TransferType> {
        let session = self.authenticate().await?;

        let channel = session.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;

        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| {
                crate::Error::FileTransferError(format!("Failed to create SFTP session: {}", e))
            })?;

        info!("SFTP session established with {}", self.socket());
        Ok(SftpTransfer { session, sftp })
    }
}

/// Get a handle to the SSH session
async fn get_handle<S: ToSocketAddrs>(
    socket: S,
    timeout: Duration,
) -> crate::Result<russh::client::Handle<Handler>> {
    let config = client::Config {
        inactivity_timeout: Some(timeout),
        ..Default::default()
    };

    let config = Arc::new(config);

    let sh = Handler {};

    let handle = tokio::time::timeout(timeout, client::connect(config, socket, sh))
        .await
        .map_err(|_| crate::Error::ConnectionError("Timed out connecting".to_string()))??;

    Ok(handle)
}

struct Handler {}

#[async_trait]
impl client::Handler for Handler {
    type Error = russh::Error;

    // Host keys are not pinned.
    async fn check_server_key(&mut self, _key: &PublicKey) -> Result<bool, Self::Error> {
        Ok(true)
    }
}
