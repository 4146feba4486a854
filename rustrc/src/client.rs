//! Protocol-agnostic client surface.
//!
//! A [`Config`] knows how to reach one host and hands out two kinds of
//! authenticated channels: a [`Session`] for running commands and a
//! [`Transfer`] for moving files. [`Client`] wraps the command session and
//! keeps the config around so the transfer channel always targets the same
//! host with the same credentials.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A remote shell command.
///
/// Program and arguments are shell-escaped when rendered. The only shell
/// operators a command can carry are stdout redirection into a path and
/// `&&` chaining onto another command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    cmd: String,
    args: Vec<String>,
    stdout: Option<String>,
    then: Option<Box<Command>>,
}

impl Command {
    pub fn new<S: Into<String>>(cmd: S) -> Self {
        Self {
            cmd: cmd.into(),
            args: Vec::new(),
            stdout: None,
            then: None,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Send this command's stdout into `path` on the remote host.
    pub fn redirect_stdout<S: Into<String>>(mut self, path: S) -> Self {
        self.stdout = Some(path.into());
        self
    }

    /// Run `next` only if this command (and anything already chained) succeeds.
    pub fn and_then(mut self, next: Command) -> Self {
        let tail = match self.then.take() {
            Some(existing) => existing.and_then(next),
            None => next,
        };
        self.then = Some(Box::new(tail));
        self
    }

    pub fn get_cmd(&self) -> &str {
        &self.cmd
    }

    pub fn get_args(&self) -> &Vec<String> {
        &self.args
    }
}

fn escape(word: &str) -> Cow<'_, str> {
    shell_escape::unix::escape(Cow::Borrowed(word))
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", escape(&self.cmd))?;
        for arg in &self.args {
            write!(f, " {}", escape(arg))?;
        }
        if let Some(path) = &self.stdout {
            write!(f, " > {}", escape(path))?;
        }
        if let Some(next) = &self.then {
            write!(f, " && {}", next)?;
        }
        Ok(())
    }
}

impl From<&Command> for Vec<u8> {
    fn from(cmd: &Command) -> Self {
        cmd.to_string().into_bytes()
    }
}

/// What a remote command left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the channel closed without reporting an exit status.
    pub status_code: Option<u32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Connection parameters for one host.
pub trait Config {
    type SessionType: Session;
    type TransferType: Transfer;

    async fn create_session(&self) -> crate::Result<Self::SessionType>;

    async fn create_transfer(&self) -> crate::Result<Self::TransferType>;
}

/// An authenticated command channel.
pub trait Session {
    async fn disconnect(&mut self) -> crate::Result<()>;

    async fn exec(&self, cmd: &Command) -> crate::Result<CommandOutput>;
}

/// An authenticated file-copy channel.
pub trait Transfer {
    async fn disconnect(&mut self) -> crate::Result<()>;

    /// Write `file_contents` to `remote_dest`, replacing anything already there.
    async fn transfer_file(
        &self,
        file_contents: Arc<Vec<u8>>,
        remote_dest: &str,
    ) -> crate::Result<()>;

    /// Copy `remote_src` into `local_dir`, keeping its file name.
    ///
    /// Returns the path of the local copy.
    async fn download_file(&self, remote_src: &str, local_dir: &Path) -> crate::Result<PathBuf>;

    async fn upload_file(&self, local_src: &Path, remote_dest: &str) -> crate::Result<()> {
        let contents = tokio::fs::read(local_src).await.map_err(|e| {
            crate::Error::FileTransferError(format!(
                "Failed to read {}: {}",
                local_src.display(),
                e
            ))
        })?;

        self.transfer_file(Arc::new(contents), remote_dest).await
    }
}

/// A connected command session plus the config that produced it.
pub struct Client<C: Config> {
    config: C,
    session: C::SessionType,
}

impl<C: Config> Client<C> {
    pub async fn connect(config: C) -> crate::Result<Self> {
        let session = config.create_session().await?;
        Ok(Self { config, session })
    }

    /// Open a file-transfer channel to the same host with the same credentials.
    pub async fn open_transfer(&self) -> crate::Result<C::TransferType> {
        self.config.create_transfer().await
    }

    pub async fn exec(&self, cmd: &Command) -> crate::Result<CommandOutput> {
        self.session.exec(cmd).await
    }

    pub async fn disconnect(&mut self) -> crate::Result<()> {
        self.session.disconnect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd;

    #[test]
    fn renders_plain_command() {
        let cmd = cmd!("rm", "/tmp/fw-01022024-101112.bin");
        assert_eq!(cmd.to_string(), "rm /tmp/fw-01022024-101112.bin");
    }

    #[test]
    fn renders_redirect() {
        let cmd = cmd!("cat", "/dev/mtdblock9").redirect_stdout("/tmp/dump.bin");
        assert_eq!(cmd.to_string(), "cat /dev/mtdblock9 > /tmp/dump.bin");
    }

    #[test]
    fn renders_chain_in_order() {
        let cmd = cmd!("true")
            .and_then(cmd!("echo", "one"))
            .and_then(cmd!("echo", "two"));
        assert_eq!(cmd.to_string(), "true && echo one && echo two");
    }

    #[test]
    fn escapes_shell_metacharacters() {
        let cmd = cmd!("rm", "/tmp/a b; reboot");
        assert_eq!(cmd.to_string(), "rm '/tmp/a b; reboot'");
    }

    #[test]
    fn bytes_match_display() {
        let cmd = cmd!("ls", "-l");
        let bytes: Vec<u8> = (&cmd).into();
        assert_eq!(bytes, b"ls -l".to_vec());
    }

    #[test]
    fn output_success_requires_zero_status() {
        let mut output = CommandOutput::default();
        assert!(!output.success());

        output.status_code = Some(1);
        assert!(!output.success());

        output.status_code = Some(0);
        assert!(output.success());
    }

    #[test]
    fn stderr_is_trimmed() {
        let output = CommandOutput {
            stderr: b"cat: can't open '/dev/mtdblock9'\n".to_vec(),
            ..Default::default()
        };
        assert_eq!(output.stderr_lossy(), "cat: can't open '/dev/mtdblock9'");
    }
}
