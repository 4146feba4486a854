use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("Command error: {0}")]
    CommandError(String),
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
    #[error("Socket Error: {0}")]
    SocketError(#[from] std::io::Error),
    #[error("File Transfer Error: {0}")]
    FileTransferError(String),
}

#[cfg(feature = "ssh")]
impl From<russh::Error> for Error {
    fn from(err: russh::Error) -> Self {
        Error::ConnectionError(err.to_string())
    }
}

#[cfg(feature = "ssh")]
impl From<russh_keys::Error> for Error {
    fn from(err: russh_keys::Error) -> Self {
        Error::ConnectionError(err.to_string())
    }
}

/// A custom `Result` type for our client operations.
pub type Result<T> = std::result::Result<T, Error>;
