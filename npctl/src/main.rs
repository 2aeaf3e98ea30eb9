//! `npctl`: a from-scratch iterative `dig` and a raw-socket `ping`,
//! sharing a dialer and address-resolver capability (§2, §6.1).

mod config;

use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::{ResolverKind, DEFAULT_PING_COUNT};
use dns_resolver::{NativeResolver, Resolver};
use net_dialer::{LocalResolver, RealDialer};
use net_icmp::Pinger;

#[derive(Parser)]
#[command(name = "npctl", about = "network troubleshooting toolkit")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a host's address by walking the DNS hierarchy from a
    /// root nameserver.
    Dig {
        /// Host to resolve.
        host: String,

        /// Print a trace of every nameserver referral followed.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Send ICMP echo requests to a host.
    Ping {
        /// Host to probe.
        host: String,

        /// Number of echo requests to send.
        #[arg(short = 'c', long, default_value_t = DEFAULT_PING_COUNT)]
        count: u16,

        /// Print a trace of each probe's resolution and dial.
        #[arg(short, long)]
        verbose: bool,

        /// Which address resolver backs hostname lookups.
        #[arg(long, value_enum, default_value_t = ResolverKind::Native)]
        resolver: ResolverKind,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Command::Dig { host, verbose } => {
            init_logging(verbose);
            run_dig(&host).await;
        }
        Command::Ping {
            host,
            count,
            verbose,
            resolver,
        } => {
            init_logging(verbose);
            run_ping(&host, count, resolver).await;
        }
    }
}

async fn run_dig(host: &str) {
    let mut resolver = Resolver::new(RealDialer);
    match resolver.resolve(host).await {
        Ok(ip) => println!("IP address of {host} is: {ip}"),
        Err(err) => {
            eprintln!("npctl: {err}");
            process::exit(1);
        }
    }
}

async fn run_ping(host: &str, count: u16, resolver: ResolverKind) {
    let result = match resolver {
        ResolverKind::Native => {
            let pinger = Pinger::new(RealDialer, NativeResolver::new(RealDialer));
            pinger.ping(host, count).await
        }
        ResolverKind::Local => {
            let pinger = Pinger::new(RealDialer, LocalResolver::new(RealDialer));
            pinger.ping(host, count).await
        }
    };

    if let Err(err) = result {
        eprintln!("npctl: {err}");
        process::exit(1);
    }
}
