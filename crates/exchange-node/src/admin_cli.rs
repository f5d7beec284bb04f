//! exchange-admin CLI tool
//!
//! Talks to a running exchange-node over its admin socket.
//!
//! Usage:
//!   exchange-admin register [alias]
//!   exchange-admin tribunal <type> [--delta N] [--message TEXT] [--target ID]
//!   exchange-admin halt-state
//!   exchange-admin snapshot
//!   exchange-admin ping

use exchange_core::tribunal::catalog;
use exchange_core::{EventKind, TribunalKind};
use exchange_node::admin_socket::{AdminCommand, AdminResponse};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

fn print_usage() {
    eprintln!("exchange-admin - Operate a Dystopian Exchange node");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  exchange-admin register [alias]           Register a player");
    eprintln!("  exchange-admin tribunal <type> [options]  Fire a tribunal event");
    eprintln!("      --delta <percent>    Magnitude override");
    eprintln!("      --message <text>     Event message");
    eprintln!("      --target <citizen>   Target citizen (global only)");
    eprintln!("  exchange-admin halt-state                 Show the market halt gate");
    eprintln!("  exchange-admin snapshot                   Take the midnight snapshot now");
    eprintln!("  exchange-admin ping                       Check if the node is running");
    eprintln!();
    eprintln!("Tribunal types: {}", tribunal_types().join(", "));
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXCHANGE_ADMIN_SOCKET  Path to admin socket (default: ./exchange-data/admin.sock)");
}

/// Every event type the node accepts for `tribunal`.
fn tribunal_types() -> Vec<&'static str> {
    let mut types: Vec<&'static str> = catalog().iter().map(|info| info.kind.as_str()).collect();
    types.push(EventKind::Global.as_str());
    types
}

fn get_socket_path() -> PathBuf {
    std::env::var("EXCHANGE_ADMIN_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./exchange-data/admin.sock"))
}

fn parse_args(args: &[String]) -> Result<AdminCommand, String> {
    let Some(command) = args.first() else {
        return Err("missing command".to_string());
    };

    match command.as_str() {
        "ping" => Ok(AdminCommand::Ping),
        "halt-state" => Ok(AdminCommand::HaltState),
        "snapshot" => Ok(AdminCommand::Snapshot),
        "register" => Ok(AdminCommand::Register {
            alias: args.get(1).cloned(),
        }),
        "tribunal" => {
            let event_type = args
                .get(1)
                .cloned()
                .ok_or("tribunal requires an event type")?;
            let mut message = None;
            let mut delta_percent = None;
            let mut target_id = None;

            let mut rest = args[2..].iter();
            while let Some(flag) = rest.next() {
                let value = rest
                    .next()
                    .ok_or_else(|| format!("{} requires a value", flag))?;
                match flag.as_str() {
                    "--delta" => {
                        let delta = value
                            .parse::<f64>()
                            .map_err(|_| format!("invalid delta: {}", value))?;
                        delta_percent = Some(delta);
                    }
                    "--message" => message = Some(value.clone()),
                    "--target" => target_id = Some(value.clone()),
                    other => return Err(format!("unknown option: {}", other)),
                }
            }

            Ok(AdminCommand::Tribunal {
                event_type,
                message,
                delta_percent,
                target_id,
            })
        }
        other => Err(format!("Unknown command: {}", other)),
    }
}

fn send_command(cmd: &AdminCommand) -> Result<AdminResponse, String> {
    let socket_path = get_socket_path();

    let mut stream = UnixStream::connect(&socket_path).map_err(|e| {
        format!(
            "Failed to connect to exchange-node at {:?}: {}\n\
             Is the exchange-node running?",
            socket_path, e
        )
    })?;

    let cmd_json = serde_json::to_string(cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if matches!(args.first().map(String::as_str), Some("-h" | "--help" | "help")) {
        print_usage();
        std::process::exit(0);
    }

    let cmd = match parse_args(&args) {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    match send_command(&cmd) {
        Ok(AdminResponse::Ok { message }) => println!("{}", message),
        Ok(AdminResponse::Data { value }) => match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", value),
        },
        Ok(AdminResponse::Pong) => println!("pong - exchange-node is running"),
        Ok(AdminResponse::Error { error }) => {
            eprintln!("Error: {}", error);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
