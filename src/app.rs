//! Command line surface and the two top-level runners.
//!
//! Like the dispatch loop itself, the runners take their scanner, notifier and
//! output stream as arguments so they can be driven from tests without
//! Bluetooth hardware or a webhook receiver.

use crate::config::{Config, ConfigError, DEFAULT_CONFIG_PATH};
use crate::dispatch::Dispatcher;
use crate::fleet::FleetState;
use crate::mac_address::MacAddress;
use crate::report;
use crate::scanner::{ScanError, Scanner};
use crate::webhook::{Notifier, WebhookClient, WebhookError};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{LevelFilter, debug, warn};
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Bridge BLE thermometer advertisements to HTTP webhooks.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Cli {
    /// Verbosity, repeat to increase (-v info, -vv debug).
    /// RUST_LOG takes precedence when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Observe configured sensors and publish their readings to webhooks
    Run(RunArgs),
    /// Report every supported sensor in range
    Scan(ScanArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Observation time in seconds
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub time: u64,

    /// MAC address to ignore, may be repeated
    #[arg(short, long, value_name = "MAC")]
    pub ignore: Vec<MacAddress>,

    /// Ignore every device listed in this configuration file
    #[arg(short = 'I', long, value_name = "CONFIG")]
    pub ignore_config: Option<PathBuf>,
}

/// Errors returned by the runners.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Log level for a `-v` count.
pub fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Webhook client for the configured receiver.
pub fn webhook_client(config: &Config) -> Result<WebhookClient, WebhookError> {
    WebhookClient::new(
        &config.webhooks.host,
        config.webhooks.port,
        config.webhooks.timeout,
    )
}

/// Run dispatch cycles for the configured fleet until `cancel` fires.
pub async fn run_bridge(
    config: &Config,
    scanner: &dyn Scanner,
    notifier: &dyn Notifier,
    cancel: &CancellationToken,
) {
    if config.registry.is_empty() {
        warn!("no devices configured, nothing will be published");
    }
    let fleet = Arc::new(FleetState::new(Arc::new(config.registry.clone())));
    Dispatcher::new(fleet, notifier, config.dispatch_settings())
        .run(scanner, cancel)
        .await;
}

/// MACs excluded from a scan: the explicit ones plus every configured device.
pub fn ignore_list(args: &ScanArgs) -> Result<BTreeSet<MacAddress>, ConfigError> {
    let mut ignore: BTreeSet<MacAddress> = args.ignore.iter().copied().collect();
    if let Some(path) = &args.ignore_config {
        let config = Config::load(path)?;
        ignore.extend(config.registry.devices().map(|device| device.mac));
    }
    Ok(ignore)
}

/// Scan for `args.time` seconds and write the report to `out`.
///
/// Cancelling ends the observation early; the report is still written.
pub async fn run_scan_with_io(
    args: &ScanArgs,
    scanner: &dyn Scanner,
    cancel: &CancellationToken,
    out: &mut dyn Write,
) -> Result<(), RunError> {
    let ignore = ignore_list(args)?;
    debug!("ignore list: {ignore:?}");

    writeln!(
        out,
        "Observing Bluetooth advertisements for {} seconds...",
        args.time
    )?;
    let devices =
        report::discover(scanner, Duration::from_secs(args.time), ignore, cancel).await?;
    report::write_report(&devices, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        FakeScanner, GOVEE_MAC, RecordingNotifier, govee_advertisement, govee_payload,
    };
    use crate::webhook::Param;

    fn scan_args(time: u64) -> ScanArgs {
        ScanArgs {
            time,
            ignore: vec![],
            ignore_config: None,
        }
    }

    #[test]
    fn test_cli_run_defaults() {
        let cli = Cli::try_parse_from(["bt-temp-webhook", "run"]).unwrap();
        assert_eq!(cli.verbose, 0);
        match cli.command {
            Command::Run(args) => assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_scan_options() {
        let cli = Cli::try_parse_from([
            "bt-temp-webhook",
            "scan",
            "-vv",
            "-t",
            "30",
            "-i",
            "a4:c1:38:01:02:03",
            "--ignore",
            "49:42:08:00:12:34",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Scan(args) => {
                assert_eq!(args.time, 30);
                assert_eq!(args.ignore.len(), 2);
                assert_eq!(args.ignore[0], GOVEE_MAC);
                assert!(args.ignore_config.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_input() {
        assert!(Cli::try_parse_from(["bt-temp-webhook", "scan", "-t", "0"]).is_err());
        assert!(Cli::try_parse_from(["bt-temp-webhook", "scan", "-i", "not-a-mac"]).is_err());
        assert!(Cli::try_parse_from(["bt-temp-webhook"]).is_err());
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0), LevelFilter::Warn);
        assert_eq!(log_level(1), LevelFilter::Info);
        assert_eq!(log_level(2), LevelFilter::Debug);
        assert_eq!(log_level(9), LevelFilter::Debug);
    }

    #[test]
    fn test_ignore_list_merges_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bt.\"49:42:08:00:12:34\"]\nmodel = \"ibsth2\"").unwrap();

        let args = ScanArgs {
            ignore: vec![GOVEE_MAC],
            ignore_config: Some(file.path().to_path_buf()),
            ..scan_args(10)
        };
        let ignore = ignore_list(&args).unwrap();
        let listed: Vec<String> = ignore.iter().map(|mac| mac.to_string()).collect();
        assert_eq!(listed, vec!["49:42:08:00:12:34", "A4:C1:38:01:02:03"]);
    }

    #[test]
    fn test_ignore_list_missing_config() {
        let args = ScanArgs {
            ignore_config: Some(PathBuf::from("/nonexistent/bt-temp-webhook.toml")),
            ..scan_args(10)
        };
        assert!(matches!(ignore_list(&args), Err(ConfigError::Io { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_scan_writes_report() {
        let scanner = FakeScanner::new(vec![vec![govee_advertisement(govee_payload(
            20.0, 40.0, 90,
        ))]]);

        let mut out = Vec::<u8>::new();
        run_scan_with_io(&scan_args(5), &scanner, &CancellationToken::new(), &mut out)
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Observing Bluetooth advertisements for 5 seconds...\nFound 1 device:\n"));
        assert!(out.contains("Temperature (C) : lo=20.0 hi=20.0 avg=20.00 count=1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_scan_ignored_device() {
        let scanner = FakeScanner::new(vec![vec![govee_advertisement(govee_payload(
            20.0, 40.0, 90,
        ))]]);
        let args = ScanArgs {
            ignore: vec![GOVEE_MAC],
            ..scan_args(5)
        };

        let mut out = Vec::<u8>::new();
        run_scan_with_io(&args, &scanner, &CancellationToken::new(), &mut out)
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.ends_with("No devices found\n"));
    }

    #[tokio::test]
    async fn test_run_scan_propagates_scan_error() {
        let scanner = FakeScanner::failing();
        let mut out = Vec::<u8>::new();
        let result =
            run_scan_with_io(&scan_args(1), &scanner, &CancellationToken::new(), &mut out).await;
        assert!(matches!(result, Err(RunError::Scan(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_bridge_publishes_until_cancelled() {
        let config: Config = r#"
[global]
interval = 1

[webhooks]
delay = 0.0

[bt."A4:C1:38:01:02:03"]
temperature = "t_living"
"#
        .parse()
        .unwrap();
        let scanner = FakeScanner::new(vec![vec![govee_advertisement(govee_payload(
            20.0, 40.0, 90,
        ))]]);
        let notifier = RecordingNotifier::default();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });

        run_bridge(&config, &scanner, &notifier, &cancel).await;

        assert_eq!(
            notifier.calls(),
            vec![("t_living".to_string(), Param::number(20.0))]
        );
        assert_eq!(scanner.starts(), 2);
        assert_eq!(scanner.active(), 0);
    }

    #[test]
    fn test_webhook_client_from_config() {
        let config: Config = "[webhooks]\nhost = \"hub.local\"\nport = 8080\n"
            .parse()
            .unwrap();
        let client = webhook_client(&config).unwrap();
        assert_eq!(client.base_url().as_str(), "http://hub.local:8080/");
    }
}
