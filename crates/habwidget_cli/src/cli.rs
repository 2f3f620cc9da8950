//! Command-line argument parsing with clap.

use clap::Parser;
use std::path::PathBuf;

/// Runs one start/stop cycle of the rollershutter widget provider against
/// in-process host adapters.
#[derive(Parser, Debug, Clone)]
#[command(name = "habwidget_cli")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Provider config JSON; built-in defaults when omitted.
    pub config: Option<PathBuf>,

    /// Absolute directory for rotating log files; logs go to stderr when omitted.
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log level (`error`, `warn`, `info`, `debug`, `trace`).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::Args;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn parses_positional_config_and_log_options() {
        let args = Args::try_parse_from([
            "habwidget_cli",
            "provider.json",
            "--log-dir",
            "/tmp/habwidget-logs",
            "--log-level",
            "info",
        ])
        .expect("arguments should parse");

        assert_eq!(args.config, Some(PathBuf::from("provider.json")));
        assert_eq!(args.log_dir, Some(PathBuf::from("/tmp/habwidget-logs")));
        assert_eq!(args.log_level.as_deref(), Some("info"));
    }

    #[test]
    fn no_arguments_uses_defaults() {
        let args = Args::try_parse_from(["habwidget_cli"]).expect("empty args should parse");
        assert!(args.config.is_none());
        assert!(args.log_dir.is_none());
        assert!(args.log_level.is_none());
    }

    #[test]
    fn help_flag_is_not_taken_as_config_path() {
        let err = Args::try_parse_from(["habwidget_cli", "--help"])
            .expect_err("--help should short-circuit parsing");
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(Args::try_parse_from(["habwidget_cli", "--verbose"]).is_err());
    }
}
