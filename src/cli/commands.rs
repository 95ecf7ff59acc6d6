//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: log in, detect and resolve obligations, notify (the default)
//! - encode: print the `t3` envelope for a JSON document
//! - decode: print the JSON inside an envelope

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use file_taxes::config::{ConfigOverrides, NotifyService};

/// File-taxes - unattended filings on Paraguay's Marangatu tax portal
// No Debug: carries the password
#[derive(Parser)]
#[command(name = "file-taxes")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug output, including request and response bodies
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Portal username (taxpayer number)
    #[arg(short, long)]
    pub username: Option<String>,

    /// Portal password
    #[arg(short, long)]
    pub password: Option<String>,

    /// NopeCHA API key (free tier works without one)
    #[arg(long)]
    pub nopecha_api_key: Option<String>,

    /// Capsolver API key (paid fallback)
    #[arg(long)]
    pub capsolver_api_key: Option<String>,

    /// Ask for the captcha on the terminal when the services fail
    #[arg(long)]
    pub interactive_captcha: bool,

    /// Where to send the run summary
    #[arg(short, long, value_enum)]
    pub notification_service: Option<NotifyService>,

    /// Text put in front of every notification
    #[arg(long)]
    pub message_prefix: Option<String>,

    /// Answer requests from local files instead of the portal
    #[arg(long)]
    pub mockup: bool,

    /// Directory with the local responses (implies --mockup)
    #[arg(long)]
    pub mockup_dir: Option<PathBuf>,

    /// Verify the portal's TLS certificate
    #[arg(long)]
    pub verify_tls: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose || self.debug
    }

    /// Command-line values as config overrides
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            username: self.username.clone(),
            password: self.password.clone(),
            nopecha_api_key: self.nopecha_api_key.clone(),
            capsolver_api_key: self.capsolver_api_key.clone(),
            interactive_captcha: self.interactive_captcha,
            notification_service: self.notification_service,
            message_prefix: self.message_prefix.clone(),
            mockup: self.mockup,
            mockup_dir: self.mockup_dir.clone(),
            verify_tls: self.verify_tls,
            verbose: self.verbose,
            debug: self.debug,
        }
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Log in, file whatever is pending and send the summary
    Run,

    /// Encode a JSON document into a `t3` envelope
    Encode {
        /// JSON document, e.g. '{"ruc":"4567890"}'
        json: String,
    },

    /// Decode a `t3` envelope back into JSON
    Decode {
        /// Envelope as it appears in the query string
        envelope: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_no_args() {
        // No args means a full run
        let cli = Cli::try_parse_from(["file-taxes"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["file-taxes", "-v"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_debug_implies_verbose() {
        let cli = Cli::try_parse_from(["file-taxes", "-d"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["file-taxes", "-c", "/path/to/file-taxes.yml"]).unwrap();
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/file-taxes.yml")));
    }

    #[test]
    fn test_run_options() {
        let cli = Cli::try_parse_from([
            "file-taxes",
            "-u",
            "4567890",
            "-p",
            "s3cret",
            "-n",
            "signal",
            "--mockup-dir",
            "/tmp/portal",
            "run",
        ])
        .unwrap();
        assert_eq!(cli.command, Some(Commands::Run));

        let overrides = cli.overrides();
        assert_eq!(overrides.username.as_deref(), Some("4567890"));
        assert_eq!(overrides.password.as_deref(), Some("s3cret"));
        assert_eq!(overrides.notification_service, Some(NotifyService::Signal));
        assert_eq!(overrides.mockup_dir, Some(PathBuf::from("/tmp/portal")));
    }

    #[test]
    fn test_unknown_notification_service() {
        assert!(Cli::try_parse_from(["file-taxes", "-n", "email"]).is_err());
    }

    #[test]
    fn test_encode_and_decode() {
        let cli = Cli::try_parse_from(["file-taxes", "encode", r#"{"ruc":"4567890"}"#]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Encode {
                json: r#"{"ruc":"4567890"}"#.to_string()
            })
        );

        let cli = Cli::try_parse_from(["file-taxes", "decode", "YPsVrj/0QvTY9O%2BPMQ9EFA%3D%3D"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Decode { .. })));
    }

    #[test]
    fn test_cli_help() {
        let mut cmd = Cli::command();
        let help = cmd.render_help();
        let help_str = help.to_string();
        assert!(help_str.contains("--config"));
        assert!(help_str.contains("--verbose"));
        assert!(help_str.contains("--notification-service"));
    }
}
