use thiserror::Error;

/// Process exit code for every failure that is not a remote command's own status.
pub const GENERIC_FAILURE: i32 = -1;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Usage(String),

    #[error("Unable to connect to the target device. Please check the connection parameters and try again. Error: {0}")]
    Connection(#[source] rustrc::Error),

    #[error("Failed to {step}. Error: {stderr}")]
    RemoteCommand {
        step: &'static str,
        status: Option<u32>,
        stderr: String,
    },

    #[error("Failure downloading the image file from the device. Error: {0}")]
    Download(#[source] rustrc::Error),

    #[error("Failure uploading the image file to the device. Error: {0}")]
    Upload(#[source] rustrc::Error),

    #[error("Local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Exit code the process should terminate with.
    ///
    /// Remote command failures hand back the remote exit status verbatim.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::RemoteCommand {
                status: Some(status),
                ..
            } => i32::try_from(*status).unwrap_or(GENERIC_FAILURE),
            _ => GENERIC_FAILURE,
        }
    }

    /// Write the operator-facing message to `out` and hand back the exit code.
    ///
    /// This is the only place a failed run is reported.
    pub fn report<W: std::io::Write>(&self, out: &mut W) -> i32 {
        // Nothing else can be done if stderr itself is gone.
        let _ = writeln!(out, "{}", self);
        self.exit_code()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_status_is_exit_code() {
        let err = Error::RemoteCommand {
            step: "dump the image file",
            status: Some(2),
            stderr: "no such device".into(),
        };
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.to_string(),
            "Failed to dump the image file. Error: no such device"
        );
    }

    #[test]
    fn report_writes_one_line_and_returns_exit_code() {
        let mut out = Vec::new();
        let err = Error::Usage("Host is a required parameter and can't be empty.".into());

        assert_eq!(err.report(&mut out), GENERIC_FAILURE);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Host is a required parameter and can't be empty.\n"
        );

        let mut out = Vec::new();
        let err = Error::RemoteCommand {
            step: "apply the original (or modified) image file",
            status: Some(4),
            stderr: "dd: write error".into(),
        };
        assert_eq!(err.report(&mut out), 4);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }

    #[test]
    fn missing_remote_status_is_generic_failure() {
        let err = Error::RemoteCommand {
            step: "apply the image file",
            status: None,
            stderr: String::new(),
        };
        assert_eq!(err.exit_code(), GENERIC_FAILURE);
    }

    #[test]
    fn everything_else_is_generic_failure() {
        let errors = [
            Error::Usage("Host is required".into()),
            Error::Connection(rustrc::Error::ConnectionError("refused".into())),
            Error::Download(rustrc::Error::FileTransferError("eof".into())),
            Error::Upload(rustrc::Error::FileTransferError("missing".into())),
            Error::Io(std::io::Error::other("denied")),
        ];
        for err in errors {
            assert_eq!(err.exit_code(), GENERIC_FAILURE, "{}", err);
        }
    }
}
