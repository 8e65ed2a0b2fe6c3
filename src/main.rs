//! UDP Logger Relay CLI - forward logging-app broadcasts to N1MM Logger Plus.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use udp_logger_relay::{
    Config, Relay, RelayStats,
    config::{DEFAULT_LISTEN_PORT, DEFAULT_TARGET_PORT},
    filter::KNOWN_PORTS,
    metrics::start_metrics_server,
    samples::{DEFAULT_SOURCE_PORT, send_samples},
};

/// UDP Logger Relay - translate WSJT-X, Fldigi, JS8Call and VarAC broadcasts into N1MM XML
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "UDP_LOGGER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "UDP_LOGGER_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// UDP port to listen on
    #[arg(long, env = "UDP_LOGGER_LISTEN_PORT")]
    listen_port: Option<u16>,

    /// Address to forward N1MM XML to
    #[arg(long, env = "UDP_LOGGER_TARGET_ADDR")]
    target_addr: Option<String>,

    /// UDP port to forward N1MM XML to
    #[arg(long, env = "UDP_LOGGER_TARGET_PORT")]
    target_port: Option<u16>,

    /// Source type (auto, wsjt-x, fldigi, js8call, varac, n1mm, general)
    #[arg(long, env = "UDP_LOGGER_SOURCE_TYPE")]
    source_type: Option<String>,

    /// Station callsign for N1MM output
    #[arg(long, env = "UDP_LOGGER_STATION")]
    station: Option<String>,

    /// Operator for N1MM output
    #[arg(long, env = "UDP_LOGGER_OPERATOR")]
    operator: Option<String>,

    /// Contest name for N1MM output
    #[arg(long, env = "UDP_LOGGER_CONTEST")]
    contest: Option<String>,

    /// Log every detection, parse and send step
    #[arg(short, long, env = "UDP_LOGGER_VERBOSE")]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "UDP_LOGGER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Maximum datagrams processed concurrently
    #[arg(long, env = "UDP_LOGGER_MAX_IN_FLIGHT")]
    max_in_flight: Option<usize>,

    /// Print statistics every N seconds (0 = never)
    #[arg(long, env = "UDP_LOGGER_STATS_INTERVAL")]
    stats_interval: Option<u64>,

    /// Serve Prometheus metrics on this port
    #[arg(long, env = "UDP_LOGGER_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Maximum runtime in seconds (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_runtime: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print version information
    Version,

    /// Show detailed usage, configuration and troubleshooting help
    HelpExtended,

    /// Write a default config file
    InitConfig {
        /// Where to write it (defaults to the platform config directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Send sample messages from every supported application
    SendSamples {
        /// Relay address to send to (host:port)
        #[arg(long)]
        target: String,

        /// Seconds between messages
        #[arg(long, default_value_t = 1)]
        interval: u64,

        /// Number of messages to send (0 = until Ctrl+C)
        #[arg(long, default_value_t = 0)]
        count: usize,

        /// Local port to send from
        #[arg(long, default_value_t = DEFAULT_SOURCE_PORT)]
        source_port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Command::Version) => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(Command::HelpExtended) => {
            print!("{}", extended_help());
            return Ok(());
        }
        Some(Command::InitConfig { ref path }) => {
            let path = match path {
                Some(path) => path.clone(),
                None => Config::config_path().context("No config directory on this platform")?,
            };
            Config::write_default(&path)?;
            println!("Wrote default configuration to {}", path.display());
            return Ok(());
        }
        Some(Command::SendSamples {
            ref target,
            interval,
            count,
            source_port,
        }) => {
            init_logging(if args.verbose { "debug" } else { "info" });
            let cancel = shutdown_token(args.max_runtime);
            let sent = send_samples(
                target,
                source_port,
                Duration::from_secs(interval),
                count,
                cancel,
            )
            .await?;
            info!("Sent {} sample messages", sent);
            return Ok(());
        }
        None => {}
    }

    let mut config = Config::load(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    init_logging(if config.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    });

    info!("UDP Logger Relay starting...");
    info!("Listen: {}", config.listen_addr());
    info!("Target: {}", config.target_addr());
    info!("Source type: {}", config.dialect_selection()?);
    info!(
        "Station: {}, operator: {}, contest: {}",
        config.formatting.n1mm.station,
        config.formatting.n1mm.operator,
        config.formatting.n1mm.contest
    );

    // Create shared statistics
    let stats = Arc::new(RelayStats::new());

    // Bind before spawning anything so startup failures exit cleanly
    let relay = Relay::from_config(&config, Arc::clone(&stats)).await?;

    if config.metrics_enabled {
        let stats_clone = Arc::clone(&stats);
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_metrics_server(port, stats_clone).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    let cancel = shutdown_token(args.max_runtime);

    // Start stats printer
    if config.stats_interval > 0 {
        let stats_clone = Arc::clone(&stats);
        let cancel_clone = cancel.clone();
        let period = Duration::from_secs(config.stats_interval);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = cancel_clone.cancelled() => break,
                    _ = interval.tick() => println!("\n{}", stats_clone.summary()),
                }
            }
        });
    }

    relay.run(cancel).await;

    // Print final statistics
    println!("\n\nFINAL STATISTICS");
    println!("{}", stats.summary());

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// A token cancelled on Ctrl+C, or after `max_runtime` seconds if non-zero.
fn shutdown_token(max_runtime: u64) -> CancellationToken {
    let cancel = CancellationToken::new();

    // Handle Ctrl+C
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                cancel_clone.cancel();
            }
            Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
        }
    });

    // Optional max runtime
    if max_runtime > 0 {
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(max_runtime)).await;
            info!("Max runtime reached");
            cancel_clone.cancel();
        });
    }

    cancel
}

/// Apply command-line flags on top of the loaded configuration.
///
/// Only flags that were actually given override the file.
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(ref addr) = args.listen_addr {
        config.listen.address = addr.clone();
    }
    if let Some(port) = args.listen_port {
        config.listen.port = port;
    }
    if let Some(ref addr) = args.target_addr {
        config.target.address = addr.clone();
    }
    if let Some(port) = args.target_port {
        config.target.port = port;
    }
    if let Some(ref source_type) = args.source_type {
        config.formatting.source_type = source_type.clone();
    }
    if let Some(ref station) = args.station {
        config.formatting.n1mm.station = station.clone();
    }
    if let Some(ref operator) = args.operator {
        config.formatting.n1mm.operator = operator.clone();
    }
    if let Some(ref contest) = args.contest {
        config.formatting.n1mm.contest = contest.clone();
    }
    if args.verbose {
        config.verbose = true;
    }
    if let Some(ref level) = args.log_level {
        config.log_level = level.clone();
    }
    if let Some(n) = args.max_in_flight {
        config.max_in_flight = n;
    }
    if let Some(secs) = args.stats_interval {
        config.stats_interval = secs;
    }
    if let Some(port) = args.metrics_port {
        config.metrics_enabled = true;
        config.metrics_port = port;
    }
}

fn extended_help() -> String {
    let known_ports = KNOWN_PORTS
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"UDP Logger Relay {version}

Listens for UDP messages from amateur radio logging applications, works out
which application sent each one, and forwards the contact to N1MM Logger Plus
(or anything that accepts its contactinfo XML).

USAGE:
    udp-logger-relay [OPTIONS] [COMMAND]

OPTIONS:
    -c, --config <PATH>         Config file
        --listen-addr <ADDR>    Address to listen on (default 0.0.0.0)
        --listen-port <PORT>    Port to listen on (default {listen})
        --target-addr <ADDR>    Address to forward to (default 127.0.0.1)
        --target-port <PORT>    Port to forward to (default {target})
        --source-type <TYPE>    Force a source type instead of detecting it
        --station <CALL>        Station callsign in N1MM output
        --operator <NAME>       Operator in N1MM output
        --contest <NAME>        Contest name in N1MM output
    -v, --verbose               Log every step, including dropped messages
        --log-level <LEVEL>     trace, debug, info, warn or error
        --max-in-flight <N>     Concurrent datagrams before dropping (default 64)
        --stats-interval <S>    Print statistics every S seconds
        --metrics-port <PORT>   Serve Prometheus metrics on PORT
        --max-runtime <S>       Exit after S seconds

Every option can also be set with an environment variable, e.g.
UDP_LOGGER_LISTEN_PORT=2237.

SUPPORTED SOURCE TYPES:
    auto      Detect each message (default)
    wsjt-x    WSJT-X ADIF log uploads
    fldigi    Fldigi
    js8call   JS8Call
    varac     VarAC JSON, ADIF and text broadcasts
    n1mm      N1MM Logger Plus contactinfo XML
    general   Free-form text

CONFIGURATION:
    Run `udp-logger-relay init-config` to write a commented config file to
    the platform config directory. A minimal example:

        [listen]
        port = {listen}

        [target]
        address = "127.0.0.1"
        port = {target}

        [formatting.n1mm]
        station = "W1AW"

DEFAULT PORTS:
    {listen}     this relay
    2237     WSJT-X
    2442     JS8Call
    {target}    N1MM Logger Plus

TROUBLESHOOTING:
    Nothing is forwarded
        Run with --verbose. Datagrams are only accepted from ports
        {known_ports} or the listen port, or from loopback ports below 10000.
    Messages are parsed as the wrong application
        Set --source-type to the sending application.
    Test without a radio
        `udp-logger-relay send-samples --target 127.0.0.1:{listen}` sends
        sample messages from every supported application.
"#,
        version = env!("CARGO_PKG_VERSION"),
        listen = DEFAULT_LISTEN_PORT,
        target = DEFAULT_TARGET_PORT,
        known_ports = known_ports,
    )
}
