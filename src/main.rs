use bt_temp_webhook::Config;
use bt_temp_webhook::app::{self, Cli, Command, RunError};
use bt_temp_webhook::scanner::{ScanError, Scanner};
use clap::Parser;
use log::{error, info};
use std::panic::{self, PanicHookInfo};
use tokio_util::sync::CancellationToken;

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

#[cfg(feature = "bluer")]
async fn open_scanner() -> Result<Box<dyn Scanner>, ScanError> {
    let scanner = bt_temp_webhook::scanner::bluer::BluerScanner::new().await?;
    Ok(Box::new(scanner))
}

#[cfg(not(feature = "bluer"))]
async fn open_scanner() -> Result<Box<dyn Scanner>, ScanError> {
    Err(ScanError::Bluetooth(
        "built without a Bluetooth backend, enable the `bluer` feature".to_string(),
    ))
}

/// Cancel `cancel` on Ctrl-C. Interruption is a normal shutdown.
fn cancel_on_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            return;
        }
        info!("interrupted, shutting down");
        cancel.cancel();
    });
}

async fn run(cli: Cli) -> Result<(), RunError> {
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    match cli.command {
        Command::Run(args) => {
            let config = Config::load(&args.config)?;
            info!("configuration from {}:\n{config}", args.config.display());
            let notifier = app::webhook_client(&config)?;
            let scanner = open_scanner().await?;
            app::run_bridge(&config, scanner.as_ref(), &notifier, &cancel).await;
        }
        Command::Scan(args) => {
            let scanner = open_scanner().await?;
            app::run_scan_with_io(&args, scanner.as_ref(), &cancel, &mut std::io::stdout())
                .await?;
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // (e.g., systemd) that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let cli = Cli::parse();

    // RUST_LOG, when set, overrides the -v derived level
    env_logger::Builder::new()
        .filter_level(app::log_level(cli.verbose))
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    match run(cli).await {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}
