use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};

use sim_dialer::console::{Command, HELP, parse_command};
use sim_dialer::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "sim-dialer", about = "Place calls through a SIM800 GSM modem")]
struct Cli {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Port to try before the configured candidates (repeatable)
    #[arg(long = "port", short)]
    ports: Vec<String>,

    /// Enable debug output, including every modem line
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let mut config = DialerConfig::load(cli.config.as_deref())?;
    config.prefer_ports(&cli.ports);
    config.apply_env_port();
    if let Err(e) = config.validate() {
        error!("{e}");
        return Err(e.into());
    }

    let subsystem = ModemSubsystem::start(
        &config,
        Arc::new(SerialPortOpener::default()),
        Arc::new(MemoryCallLogStore::new()),
    );
    let printer = tokio::spawn(print_events(subsystem.subscribe()));

    println!("{HELP}");
    tokio::select! {
        result = run_console(&subsystem) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    subsystem.shutdown().await;
    printer.abort();
    Ok(())
}

fn init_logger(verbose: bool) {
    let filter = if verbose { "sim_dialer=debug,info" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

/// Prints every event as `<name> <json>`.
async fn print_events(mut events: broadcast::Receiver<DialerEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => println!("{} {}", event.event_name(), event.payload()),
            Err(RecvError::Lagged(missed)) => warn!("Event printer fell behind, {missed} events dropped"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn run_console(subsystem: &ModemSubsystem) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match command {
            Command::Dial(request) => match subsystem.dial(request).await {
                Ok(outcome) => println!("Dialing, call id {}", outcome.call_id),
                Err(e) if e.is_retryable() => println!("{e} (try again shortly)"),
                Err(e) => println!("{e}"),
            },
            Command::Hangup(call_id) => match subsystem.hangup(&call_id).await {
                Ok(()) => println!("Hung up {call_id}"),
                Err(e) => println!("{e}"),
            },
            Command::Status => {
                let status = subsystem.status();
                println!(
                    "connected={} ready={} link={:?} port={}",
                    status.connected,
                    status.ready,
                    subsystem.link_state(),
                    subsystem.port().unwrap_or_else(|| "-".to_string())
                );
            }
            Command::Calls => {
                let calls = subsystem.active_calls();
                if calls.is_empty() {
                    println!("No calls in progress");
                }
                for call in calls {
                    println!("{}  {}", call.call_id, call.destination_number);
                }
            }
            Command::Logs(phone) => {
                let filter = CallLogFilter {
                    phone_number: phone,
                };
                match subsystem.call_logs(filter).await {
                    Ok(logs) if logs.is_empty() => println!("No call logs"),
                    Ok(logs) => {
                        for log in logs {
                            println!(
                                "{}  {}  {} ({})  {}s",
                                log.call_time.format("%Y-%m-%d %H:%M:%S"),
                                log.phone_number,
                                log.person_name,
                                log.company_name,
                                log.duration_secs
                            );
                        }
                    }
                    Err(e) => println!("{e}"),
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }
    Ok(())
}
