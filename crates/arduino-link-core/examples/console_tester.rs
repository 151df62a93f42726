//! Arduino Console Tester
//!
//! Finds a board running the connector sketch, blinks its LED on a fixed
//! interval and prints whatever the board reports back.
//!
//! Usage:
//!   cargo run --example console_tester -- [OPTIONS]
//!
//! Options:
//!   --port PORT       Port to try before scanning (default: platform default)
//!   --baud RATE       Baud rate (default: 9600)
//!   --timeout MS      Read timeout in ms (default: 50)
//!   --board TYPE      generic | uno | leonardo | nano (default: generic)
//!   --settle MS       Delay after opening a port (default: 0)
//!   --blinks N        Number of blinks before exiting (default: 10)
//!   --interval MS     Time between blinks (default: 1000)
//!   --list            List serial ports and exit
//!
//! Set RUST_LOG=debug to see every probe and wire message.

use anyhow::{anyhow, bail, Context, Result};
use arduino_link_core::prelude::*;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

struct Options {
    config: ConnectionConfig,
    blinks: u32,
    interval: Duration,
    list_only: bool,
}

fn parse_args() -> Result<Option<Options>> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ConnectionConfig::default();
    let mut blinks = 10u32;
    let mut interval_ms = 1000u64;
    let mut list_only = false;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || -> Result<String> {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| anyhow!("missing value for {}", flag))
        };
        match flag {
            "--port" | "-p" => config.port_name = value()?,
            "--baud" | "-b" => config.baud_rate = value()?.parse().context("--baud")?,
            "--timeout" | "-t" => config.timeout_ms = value()?.parse().context("--timeout")?,
            "--board" => config.board = value()?.parse::<BoardType>().map_err(|e| anyhow!(e))?,
            "--settle" => config.settle_delay_ms = value()?.parse().context("--settle")?,
            "--blinks" | "-n" => blinks = value()?.parse().context("--blinks")?,
            "--interval" | "-i" => interval_ms = value()?.parse().context("--interval")?,
            "--list" | "-l" => list_only = true,
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            other => bail!("unknown option: {}", other),
        }
        i += 1;
    }

    Ok(Some(Options {
        config,
        blinks,
        interval: Duration::from_millis(interval_ms),
        list_only,
    }))
}

fn print_help() {
    println!("Arduino Console Tester v{}", arduino_link_core::VERSION);
    println!();
    println!("Usage: console_tester [--port PORT] [--baud RATE] [--timeout MS]");
    println!("                      [--board TYPE] [--settle MS] [--blinks N]");
    println!("                      [--interval MS] [--list]");
}

fn list() {
    let ports = Connection::list_ports();
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => println!(
                "  {}  [{:04x}:{:04x}] {}",
                port.name,
                vid,
                pid,
                port.product.unwrap_or_default()
            ),
            _ => println!("  {}", port.name),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some(options) = parse_args()? else {
        return Ok(());
    };

    if options.list_only {
        list();
        return Ok(());
    }

    let mut arduino = Connection::new(options.config);
    let connected = arduino.connect();
    for attempt in arduino.last_scan() {
        println!("  {:<16} {:?}", attempt.port, attempt.outcome);
    }
    if !connected {
        bail!("no Arduino answered the handshake");
    }
    println!("Connected on {}", arduino.port_name());

    for n in 1..=options.blinks {
        if !arduino.blink() {
            bail!("lost connection to {}", arduino.port_name());
        }
        println!("Blink {}/{}", n, options.blinks);

        // Drain replies until the next blink is due
        let next = Instant::now() + options.interval;
        while Instant::now() < next {
            match arduino.read_line() {
                Some(line) if !line.is_empty() => match ArduinoEvent::from_line(&line) {
                    Some(event) => println!("  event: {:?}", event),
                    None => println!("  line:  {}", line.trim_end()),
                },
                _ => std::thread::sleep(Duration::from_millis(10)),
            }
        }
    }

    let counters = arduino.counters();
    println!(
        "Sent {} message(s) / {} bytes, received {} line(s) / {} bytes",
        counters.tx_messages, counters.tx_bytes, counters.rx_lines, counters.rx_bytes
    );
    arduino.disconnect();
    Ok(())
}
