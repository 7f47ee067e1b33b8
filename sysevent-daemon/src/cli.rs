//! CLI argument definitions for sysevent-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// syslog event ingestion daemon.
///
/// Receives syslog datagrams on a UDP socket, converts them into
/// structured notifications on a fixed read cadence, and forwards them
/// to the notification sink.
#[derive(Parser, Debug)]
#[command(name = "sysevent-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to sysevent.toml configuration file.
    #[arg(short, long, default_value = "/etc/sysevent/sysevent.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::parse_from(["sysevent-daemon"]);
        assert_eq!(cli.config, PathBuf::from("/etc/sysevent/sysevent.toml"));
        assert!(cli.log_level.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn overrides() {
        let cli = DaemonCli::parse_from([
            "sysevent-daemon",
            "-c",
            "/tmp/sysevent.toml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--validate",
        ]);
        assert_eq!(cli.config, PathBuf::from("/tmp/sysevent.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
        assert!(cli.validate);
    }

    #[test]
    fn verify_command() {
        use clap::CommandFactory;
        DaemonCli::command().debug_assert();
    }
}
