use anyhow::{Context, Result};
use clap::Parser;
use dht_sens::config::{default_script_path, AppConfig};
use dht_sens::core::{
    DisplayUpdate, InstanceCommand, InstanceHandle, Notification, NotificationHub,
    NotificationKind, WidgetInstance,
};
use dht_sens_core::{ConfigValidator, ValidatorDefaults};
use dht_sens_sources::{AcquisitionServer, ScriptReader};
use log::{error, info, warn};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Sender name used for notifications injected from the console
const CONSOLE_SENDER: &str = "console";

/// dht-sens - DHT11/DHT22 temperature and humidity widgets
#[derive(Parser, Debug, Clone)]
#[command(name = "dht-sens")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug verbosity level (0=quiet, 1=info, 2=debug, 3=trace)
    #[arg(short = 'd', long = "debug", value_name = "LEVEL", default_value = "0")]
    debug: u8,

    /// Configuration file to use instead of the default location
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a default configuration file and exit
    #[arg(long = "write-default-config")]
    write_default_config: bool,
}

/// Operator commands read from stdin
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Suspend(String),
    Resume(String),
    PeerReady,
    Status,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default();
        let target = words.next().map(str::to_string);

        let parsed = match (command, target) {
            ("suspend", Some(name)) => Self::Suspend(name),
            ("resume", Some(name)) => Self::Resume(name),
            ("suspend" | "resume", None) => {
                return Err(format!("usage: {} <instance name>", command))
            }
            ("peer-ready", None) => Self::PeerReady,
            ("status", None) => Self::Status,
            ("quit" | "exit", None) => Self::Quit,
            _ => {
                return Err(format!(
                    "unknown command '{}' (suspend <name>, resume <name>, peer-ready, status, quit)",
                    line.trim()
                ))
            }
        };

        if words.next().is_some() {
            return Err(format!("too many arguments: '{}'", line.trim()));
        }
        Ok(parsed)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logger with verbosity based on -d/--debug flag
    // Level 0 (default): warn only
    // Level 1: info
    // Level 2: debug
    // Level 3+: trace
    let log_level = match cli.debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Allow RUST_LOG to override CLI setting
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    warn!("Starting dht-sens v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.write_default_config {
        let path = match cli.config {
            Some(path) => path,
            None => AppConfig::config_path()?,
        };
        AppConfig::default()
            .save_to_path(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Default configuration written to {}", path.display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_path(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => AppConfig::load().context("Failed to load configuration")?,
    };
    info!("Loaded configuration with {} instance(s)", config.instances.len());

    let validator = ConfigValidator::new(ValidatorDefaults {
        script_path: default_script_path(),
        ..ValidatorDefaults::default()
    });

    let (server, server_task) = AcquisitionServer::spawn(Arc::new(ScriptReader::new()));
    let hub = NotificationHub::new();
    let (display_tx, display_rx) = mpsc::channel(64);
    let display_task = tokio::spawn(print_display_updates(display_rx));
    tokio::spawn(log_notifications(hub.clone()));

    let mut names = HashSet::new();
    let mut instances: Vec<(InstanceHandle, JoinHandle<()>)> = Vec::new();
    for instance in &config.instances {
        if !names.insert(instance.name.clone()) {
            warn!("Duplicate instance name '{}', console commands reach the first one only", instance.name);
        }
        let widget_config = validator.validate(&instance.settings);
        let widget = WidgetInstance::new(&instance.name, widget_config, hub.clone(), display_tx.clone());
        info!("Starting instance '{}' ({})", widget.name(), widget.instance_id());
        instances.push(widget.spawn(server.clone()));
    }
    drop(display_tx);
    drop(server);

    let handles: Vec<InstanceHandle> = instances.iter().map(|(handle, _)| handle.clone()).collect();
    console(&handles, &hub).await;

    info!("Shutting down");
    for handle in &handles {
        if let Err(e) = handle.send(InstanceCommand::Shutdown).await {
            warn!("{}", e);
        }
    }
    for (handle, task) in instances {
        if let Err(e) = task.await {
            error!("Instance '{}' task failed: {}", handle.name(), e);
        }
    }
    drop(handles);
    // All request senders are gone now, so the server drains and stops
    if let Err(e) = server_task.await {
        error!("Acquisition server task failed: {}", e);
    }
    if let Err(e) = display_task.await {
        error!("Display task failed: {}", e);
    }
    Ok(())
}

/// Read operator commands until `quit`, end of input or Ctrl-C
async fn console(handles: &[InstanceHandle], hub: &NotificationHub) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    // No console attached; keep running until Ctrl-C
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                    }
                    break;
                }
                Err(e) => {
                    error!("Failed to read console input: {}", e);
                    break;
                }
            },
        };

        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Suspend(name)) => {
                forward(handles, &name, InstanceCommand::Suspend).await
            }
            Ok(ConsoleCommand::Resume(name)) => {
                forward(handles, &name, InstanceCommand::Resume).await
            }
            Ok(ConsoleCommand::PeerReady) => {
                hub.publish(Notification::new(
                    CONSOLE_SENDER,
                    NotificationKind::CurrentWeatherData,
                ));
            }
            Ok(ConsoleCommand::Status) => print_status(handles).await,
            Ok(ConsoleCommand::Quit) => break,
            Err(e) => println!("{}", e),
        }
    }
}

async fn forward(handles: &[InstanceHandle], name: &str, command: InstanceCommand) {
    match handles.iter().find(|handle| handle.name() == name) {
        Some(handle) => {
            if let Err(e) = handle.send(command).await {
                warn!("{}", e);
            }
        }
        None => println!("No instance named '{}'", name),
    }
}

async fn print_status(handles: &[InstanceHandle]) {
    for handle in handles {
        match handle.status().await {
            Ok(status) => {
                let reading = match status.reading {
                    Some(r) => format!(
                        "{:.1} C / {:.1} F / {:.2} K, {:.1}% humidity",
                        r.celsius, r.fahrenheit, r.kelvin, r.humidity
                    ),
                    None => "no reading".to_string(),
                };
                let pin = status
                    .canonical_pin
                    .map_or_else(|| "invalid".to_string(), |pin| pin.to_string());
                println!(
                    "{} [{}] pin {} {:?} {:?} last success {}: {}",
                    status.name,
                    status.instance_id,
                    pin,
                    status.schedule,
                    status.phase,
                    status.last_successful_poll.to_rfc3339(),
                    reading
                );
            }
            Err(e) => println!("{}: {}", handle.name(), e),
        }
    }
}

async fn print_display_updates(mut updates: mpsc::Receiver<DisplayUpdate>) {
    while let Some(update) = updates.recv().await {
        for line in update.content.lines() {
            println!("[{}|{}] {}", update.name, update.font_size.css_class(), line);
        }
    }
}

async fn log_notifications(hub: NotificationHub) {
    let mut notifications = hub.subscribe();
    loop {
        match notifications.recv().await {
            Ok(notification) => info!("Notification from {}: {:?}", notification.sender, notification.kind),
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Notification log missed {} notifications", skipped)
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_console_commands() {
        assert_eq!("suspend indoor".parse(), Ok(ConsoleCommand::Suspend("indoor".to_string())));
        assert_eq!("  resume cellar ".parse(), Ok(ConsoleCommand::Resume("cellar".to_string())));
        assert_eq!("peer-ready".parse(), Ok(ConsoleCommand::PeerReady));
        assert_eq!("status".parse(), Ok(ConsoleCommand::Status));
        assert_eq!("quit".parse(), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn test_reject_malformed_commands() {
        assert!("suspend".parse::<ConsoleCommand>().is_err());
        assert!("status now".parse::<ConsoleCommand>().is_err());
        assert!("reboot".parse::<ConsoleCommand>().is_err());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from(["dht-sens", "-d", "2", "--config", "/tmp/dht.json"]);
        assert_eq!(cli.debug, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/dht.json")));
        assert!(!cli.write_default_config);
    }
}
