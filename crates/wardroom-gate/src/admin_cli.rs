//! wardroom-admin CLI tool
//!
//! Talks to a running wardroom-node over its admin socket.
//!
//! Usage:
//!   wardroom-admin set-rank <sovereign_id> <rank|none>
//!   wardroom-admin list-rank <rank>
//!   wardroom-admin invite <email> <rank> [org_id]
//!   wardroom-admin audit-identities
//!   wardroom-admin validate-manifests
//!   wardroom-admin ping

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use wardroom_gate::admin_socket::{default_socket_path, AdminCommand, AdminResponse};
use wardroom_rank::Rank;

fn print_usage() {
    eprintln!("wardroom-admin - Manage Wardroom ranks and identities");
    eprintln!();
    eprintln!("Usage: wardroom-admin <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  set-rank <sovereign_id> <rank|none>  Assign or clear a rank");
    eprintln!("  list-rank <rank>                     List users holding a rank");
    eprintln!("  invite <email> <rank> [org_id]       Invite an email, print its ticket");
    eprintln!("  audit-identities                     Check identity mapping integrity");
    eprintln!("  validate-manifests                   Run the route manifest validator");
    eprintln!("  ping                                 Check if the node is running");
    eprintln!();
    eprintln!("Ranks: crew, captain, commodore, admiral");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  WARDROOM_ADMIN_SOCKET  Admin socket path");
    eprintln!("                         (default: $WARDROOM_DATA_DIR/admin.sock)");
}

fn get_socket_path() -> PathBuf {
    std::env::var("WARDROOM_ADMIN_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_socket_path())
}

fn send_command(cmd: AdminCommand) -> Result<AdminResponse, String> {
    let socket_path = get_socket_path();

    let mut stream = UnixStream::connect(&socket_path).map_err(|e| {
        format!(
            "Failed to connect to wardroom-node at {:?}: {}\n\
             Is the wardroom-node running?",
            socket_path, e
        )
    })?;

    let cmd_json = serde_json::to_string(&cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn arg<'a>(args: &'a [String], index: usize, what: &str) -> &'a str {
    match args.get(index) {
        Some(value) => value.as_str(),
        None => fail(&format!("{} requires a {} argument", args[1], what)),
    }
}

fn parse_rank(raw: &str) -> Rank {
    raw.parse::<Rank>().unwrap_or_else(|e| fail(&format!("{}", e)))
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let cmd = match args[1].as_str() {
        "set-rank" => {
            let sovereign_id = arg(&args, 2, "sovereign_id").to_string();
            let rank = match arg(&args, 3, "rank") {
                "none" => None,
                raw => Some(parse_rank(raw)),
            };
            AdminCommand::SetRank { sovereign_id, rank }
        }
        "list-rank" => AdminCommand::ListRank {
            rank: parse_rank(arg(&args, 2, "rank")),
        },
        "invite" => AdminCommand::Invite {
            email: arg(&args, 2, "email").to_string(),
            rank: parse_rank(arg(&args, 3, "rank")),
            org_id: args.get(4).cloned(),
        },
        "audit-identities" => AdminCommand::AuditIdentities,
        "validate-manifests" => AdminCommand::ValidateManifests,
        "ping" => AdminCommand::Ping,
        "-h" | "--help" | "help" => {
            print_usage();
            std::process::exit(0);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    };

    match send_command(cmd) {
        Ok(response) => match response {
            AdminResponse::Ok { message } => {
                println!("{}", message);
            }
            AdminResponse::Error { error } => fail(&error),
            AdminResponse::List { items } => {
                if items.is_empty() {
                    println!("(none)");
                } else {
                    for item in items {
                        println!("{}", item);
                    }
                }
            }
            AdminResponse::Pong => {
                println!("pong - wardroom-node is running");
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
