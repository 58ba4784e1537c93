//! amqp-dump CLI - move messages between AMQP brokers and archive dump files.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

use amqp_dump::drivers::{create_destination, create_source};
use amqp_dump::{
    AmqpConfig, ArchiveConfig, Config, DumpError, DumpOptions, EndpointConfig, Orchestrator,
};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "amqp-dump")]
#[command(about = "Move messages between AMQP brokers and archive dump files")]
#[command(version)]
struct Cli {
    /// Input endpoint: an amqp:// URI or a dump file path
    input: Option<String>,

    /// Output endpoint: an amqp:// URI or a dump file path
    output: Option<String>,

    /// Path to YAML configuration file (alternative to endpoint arguments)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Queue to consume from (AMQP input)
    #[arg(long, default_value = "")]
    queue: String,

    /// Exchange to publish to (AMQP output)
    #[arg(long, default_value = "")]
    exchange: String,

    /// Routing key for published messages (AMQP output)
    #[arg(long, default_value = "")]
    routing_key: String,

    /// Consumer prefetch window (AMQP input)
    #[arg(long, default_value = "64")]
    prefetch: u16,

    /// Upper bound on in-flight messages between source and transform stage
    #[arg(long, default_value = "1000")]
    buffer_capacity: usize,

    /// Normalize encoded header properties to plain UTF-8 text in flight
    #[arg(long)]
    decode_encoded_headers: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), DumpError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = build_config(&cli)?;
    let cancel_token = setup_signal_handler();

    let source = create_source(&config.source).await?;
    let destination = create_destination(&config.destination).await?;

    let orchestrator = Orchestrator::new(source, destination, config.options);
    let summary = orchestrator.run(cancel_token).await?;

    println!("\nDump completed!");
    println!("  Messages: {}", summary.messages_transferred);
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!("  Throughput: {} msg/sec", summary.messages_per_second());

    Ok(())
}

fn build_config(cli: &Cli) -> Result<Config, DumpError> {
    if let Some(ref path) = cli.config {
        let config = Config::load(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    let (input, output) = match (&cli.input, &cli.output) {
        (Some(input), Some(output)) => (input, output),
        _ => {
            return Err(DumpError::Config(
                "provide INPUT and OUTPUT endpoints, or --config".to_string(),
            ))
        }
    };

    let config = Config {
        source: endpoint_from_uri(input, cli),
        destination: endpoint_from_uri(output, cli),
        options: DumpOptions {
            buffer_capacity: cli.buffer_capacity,
            decode_encoded_headers: cli.decode_encoded_headers,
        },
    };
    config.validate()?;

    Ok(config)
}

/// Classify an endpoint argument: broker URIs go to AMQP, everything else is
/// treated as a dump-file path.
fn endpoint_from_uri(uri: &str, cli: &Cli) -> EndpointConfig {
    if uri.starts_with("amqp://") || uri.starts_with("amqps://") {
        EndpointConfig::Amqp(AmqpConfig {
            uri: uri.to_string(),
            queue: cli.queue.clone(),
            exchange: cli.exchange.clone(),
            routing_key: cli.routing_key.clone(),
            prefetch: cli.prefetch,
        })
    } else {
        EndpointConfig::Archive(ArchiveConfig {
            path: PathBuf::from(uri),
        })
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    let token_int = cancel_token.clone();
    let token_term = cancel_token.clone();

    tokio::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Draining buffered messages...");
        token_int.cancel();
    });

    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Draining buffered messages...");
        token_term.cancel();
    });

    cancel_token
}

/// Setup signal handler for Windows (only SIGINT/Ctrl-C).
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        eprintln!("\nReceived Ctrl-C. Draining buffered messages...");
        token.cancel();
    });

    cancel_token
}
