//! fch-ctl: command-line client for the fchd query API.

use anyhow::{Context, Result};

mod cmd;

const DEFAULT_PORT: u16 = 5000;

fn print_usage() {
    println!("Usage: fch-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  query [options]   Find the closest available routers");
    println!("  routers           Show the published availability snapshot");
    println!("  directory         List every known router, probed or not");
    println!();
    println!("Query options:");
    println!("  --cap <transport>   udp, wss or http3 (repeatable, default udp)");
    println!("  --k <n>             Routers per transport (repeatable)");
    println!("  --lon <deg>         Client longitude");
    println!("  --lat <deg>         Client latitude");
    println!("  --network <name>    Only routers under /<name>");
    println!("  --no-ipv4           Exclude IPv4");
    println!("  --no-ipv6           Exclude IPv6");
    println!("  --json              Request JSON instead of plain text");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["query", rest @ ..] => cmd::query::cmd_query(port, rest).await,
        [] => cmd::query::cmd_query(port, &[]).await,
        ["routers"] => cmd::routers::cmd_routers(port).await,
        ["directory"] => cmd::routers::cmd_directory(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
