use clap::{value_parser, Arg, ArgMatches};
use rustrc::ssh::SSHConfig;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "192.168.1.1";
pub const DEFAULT_USER: &str = "ubnt";
pub const DEFAULT_PASSWORD: &str = "ubnt";
pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Everything needed to reach the device, fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    pub host: String,
    pub user: String,
    pub password: String,
    pub port: u16,
    /// Image to write back after the backup. `None` means backup only.
    pub restore: Option<PathBuf>,
    /// Private key to authenticate with instead of the password.
    pub key: Option<PathBuf>,
    pub inactivity_timeout: Duration,
}

impl ConnectionParameters {
    /// Resolve the host and build the SSH configuration for both sessions.
    pub async fn ssh_config(&self) -> rustrc::Result<SSHConfig> {
        let socket = (self.host.as_str(), self.port);
        match &self.key {
            Some(key) => {
                SSHConfig::key(self.user.clone(), socket, key.clone(), self.inactivity_timeout)
                    .await
            }
            None => {
                SSHConfig::password(
                    self.user.clone(),
                    self.password.clone(),
                    socket,
                    self.inactivity_timeout,
                )
                .await
            }
        }
    }
}

pub fn cli() -> clap::Command {
    clap::command!()
        .about("Dump (and optionally restore) the firmware flash partition of a UFiber device")
        .arg(
            Arg::new("host")
                .long("host")
                .default_value(DEFAULT_HOST)
                .help("IP or hostname of the target UFiber device."),
        )
        .arg(
            Arg::new("user")
                .long("user")
                .default_value(DEFAULT_USER)
                .help("SSH user name."),
        )
        .arg(
            Arg::new("pw")
                .long("pw")
                .default_value(DEFAULT_PASSWORD)
                .help("SSH password."),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .default_value("22")
                .value_parser(value_parser!(u16))
                .help("SSH port of the target UFiber device."),
        )
        .arg(
            Arg::new("restore")
                .long("restore")
                .value_name("FILE")
                .help("Restore a previous (or modified!) version of the firmware."),
        )
        .arg(
            Arg::new("key")
                .long("key")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Authenticate with this private key instead of the password."),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .default_value("30")
                .value_parser(value_parser!(u64).range(1..))
                .help("SSH inactivity timeout in seconds."),
        )
}

impl TryFrom<&ArgMatches> for ConnectionParameters {
    type Error = crate::Error;

    fn try_from(matches: &ArgMatches) -> crate::Result<Self> {
        let host = matches
            .get_one::<String>("host")
            .map(|host| host.trim().to_string())
            .unwrap_or_default();

        if host.is_empty() {
            return Err(crate::Error::Usage(
                "Host is a required parameter and can't be empty.".to_string(),
            ));
        }

        let restore = matches
            .get_one::<String>("restore")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            host,
            user: matches
                .get_one::<String>("user")
                .cloned()
                .unwrap_or_else(|| DEFAULT_USER.to_string()),
            password: matches
                .get_one::<String>("pw")
                .cloned()
                .unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
            port: matches
                .get_one::<u16>("port")
                .copied()
                .unwrap_or(DEFAULT_PORT),
            restore,
            key: matches.get_one::<PathBuf>("key").cloned(),
            inactivity_timeout: Duration::from_secs(
                matches
                    .get_one::<u64>("timeout")
                    .copied()
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> crate::Result<ConnectionParameters> {
        let matches = cli()
            .try_get_matches_from(std::iter::once("flashback").chain(args.iter().copied()))
            .unwrap();
        ConnectionParameters::try_from(&matches)
    }

    #[test]
    fn defaults_match_factory_settings() {
        let params = parse(&[]).unwrap();
        assert_eq!(params.host, "192.168.1.1");
        assert_eq!(params.user, "ubnt");
        assert_eq!(params.password, "ubnt");
        assert_eq!(params.port, 22);
        assert_eq!(params.restore, None);
        assert_eq!(params.key, None);
        assert_eq!(params.inactivity_timeout, Duration::from_secs(30));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let params = parse(&[
            "--host",
            "10.0.0.2",
            "--user",
            "admin",
            "--pw",
            "secret",
            "--port",
            "2222",
            "--restore",
            "dumps/fw-01022024-101112.bin",
            "--timeout",
            "5",
        ])
        .unwrap();

        assert_eq!(params.host, "10.0.0.2");
        assert_eq!(params.user, "admin");
        assert_eq!(params.password, "secret");
        assert_eq!(params.port, 2222);
        assert_eq!(
            params.restore,
            Some(PathBuf::from("dumps/fw-01022024-101112.bin"))
        );
        assert_eq!(params.inactivity_timeout, Duration::from_secs(5));
    }

    #[test]
    fn blank_hosts_are_usage_errors() {
        for host in ["", " ", "\t", "  \n "] {
            let err = parse(&["--host", host]).unwrap_err();
            assert!(matches!(err, crate::Error::Usage(_)), "host {:?}", host);
            assert_eq!(err.exit_code(), crate::error::GENERIC_FAILURE);
        }
    }

    #[test]
    fn blank_restore_means_backup_only() {
        let params = parse(&["--restore", "   "]).unwrap();
        assert_eq!(params.restore, None);
    }

    #[test]
    fn port_must_be_numeric() {
        assert!(cli()
            .try_get_matches_from(["flashback", "--port", "ssh"])
            .is_err());
    }

    #[tokio::test]
    async fn ssh_config_uses_password_without_key() {
        let params = parse(&["--host", "127.0.0.1", "--port", "2022"]).unwrap();
        let config = params.ssh_config().await.unwrap();
        assert!(matches!(config, SSHConfig::Password { .. }));
        assert_eq!(config.socket(), "127.0.0.1:2022".parse().unwrap());
    }

    #[tokio::test]
    async fn ssh_config_prefers_key() {
        let params = parse(&["--host", "127.0.0.1", "--key", "/root/.ssh/id_ed25519"]).unwrap();
        let config = params.ssh_config().await.unwrap();
        assert!(matches!(config, SSHConfig::Key { .. }));
    }
}
