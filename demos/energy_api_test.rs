//! Energy API Test
//!
//! Runs the interactive hardware test sequence against the energy
//! controller. Battery voltage and percentage are logged every 2s; type
//! `begin` to identify the board, then click the main push button to step
//! through the tests:
//! - LED chase and LED gauge sweep
//! - Load switch on/off
//! - Custom battery characteristics (12-14V)
//! - Critical section with an 8s timeout, then leaving it early
//! - Self reset
//!
//! Usage:
//!   cargo run --example energy_api_test                          # Interactive port selection
//!   cargo run --example energy_api_test -- /dev/ttyUSB0          # Specify port
//!   cargo run --example energy_api_test -- sim                   # Simulated controller
//!   cargo run --example energy_api_test -- /dev/ttyUSB0 cfg.json # With config file
//!
//! Set RUST_LOG environment variable to control logging:
//!   RUST_LOG=trace cargo run --example energy_api_test -- sim

use energy_protocol::{
    ClickScript, Config, ConsoleCommand, Poller, Result, SerialLink, SimulatedPeer, TestState,
    Transport,
};
use inquire::Select;
use log::{info, warn};
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

/// Interactive serial port selection using inquire
fn select_port() -> Result<String> {
    let ports = Transport::list_ports()?;

    if ports.is_empty() {
        eprintln!("No serial ports found!");
        std::process::exit(1);
    }

    let port_names: Vec<String> = ports
        .iter()
        .map(|p| format!("{} - {:?}", p.port_name, p.port_type))
        .collect();

    let selection = Select::new("Select a serial port:", port_names)
        .prompt()
        .map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Selection cancelled: {}", e),
            )
        })?;

    // Extract just the port name (before " - ")
    let port_name = selection.split(" - ").next().unwrap().to_string();
    Ok(port_name)
}

fn load_config(path: Option<String>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = std::fs::read_to_string(&path)?;
    serde_json::from_str(&text).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{}: {}", path, e)).into()
    })
}

/// Forward console lines to the scheduler
fn spawn_console() -> Receiver<ConsoleCommand> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines().map_while(|line| line.ok()) {
            match ConsoleCommand::parse(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None => warn!("Unknown command {:?}. Use begin or quit.", line.trim()),
            }
        }
    });
    rx
}

fn drive<S, F>(transport: Transport<S>, config: &Config, after_tick: F)
where
    S: SerialLink,
    F: FnMut(&mut Poller<S>),
{
    let console = spawn_console();
    info!("Type begin to begin tests. Then use the button to cycle through the tests.");
    let mut poller = Poller::new(transport, config.poller);
    poller.run_with(&console, after_tick);
}

fn main() -> Result<()> {
    // Initialize logger with default info level if RUST_LOG is not set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let port_name = args.next().map(Ok).unwrap_or_else(select_port)?;
    let mut config = load_config(args.next())?;
    let timeout = Duration::from_millis(config.transport.timeout_ms);

    if port_name == "sim" {
        info!("Using simulated energy controller");
        // One click every ten button polls, starting after begin
        let mut script = ClickScript::new(8, 9);
        let transport = Transport::new(SimulatedPeer::new(), timeout);
        drive(transport, &config, move |poller| {
            let begun = poller.sequencer().current() != Some(TestState::Startup);
            script.feed(poller.transport_mut().link_mut(), begun);
        });
    } else {
        config.transport.port_name = port_name;
        info!("Connecting to energy controller on {}...", config.transport.port_name);
        let transport = Transport::open(&config.transport)?;
        drive(transport, &config, |_| {});
    }

    Ok(())
}
