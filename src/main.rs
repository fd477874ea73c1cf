use clap::{Parser, Subcommand};
use netcache::capture::AfPacketSocket;
use netcache::config;
use netcache::dataplane::{new_tables, Pipeline};
use netcache::kv::{self, Backend, KvStore};
use netcache::protocol::kv::DEFAULT_PORT;
use netcache::switch::Switch;
use netcache::telemetry::{init_logging, MetricsRegistry};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::info;

/// Seconds between periodic metrics logs
const STATS_INTERVAL_SECS: u64 = 30;

#[derive(Parser)]
#[command(name = "netcache")]
#[command(about = "In-network key/value cache switch")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run the switch
    Run {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Run the backend key/value server
    Server {
        /// Address to listen on
        #[arg(short, long, default_value_t = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT))]
        bind: SocketAddr,

        /// Store contents as key=value pairs
        pairs: Vec<String>,
    },
    /// Look up one key
    Client {
        host: IpAddr,
        key: u32,

        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
    /// Send a non-lookup UDP probe that the switch must drop
    OtherTraffic {
        host: IpAddr,

        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate config.toml
    Validate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config {
            action: ConfigAction::Validate { config },
        } => {
            init_logging(None);
            cmd_config_validate(&config)
        }
        Commands::Run { config } => cmd_run(&config),
        Commands::Server { bind, pairs } => {
            init_logging(None);
            cmd_server(bind, &pairs)
        }
        Commands::Client {
            host,
            key,
            port,
            timeout_ms,
        } => cmd_client(SocketAddr::new(host, port), key, timeout_ms),
        Commands::OtherTraffic { host, timeout_ms } => cmd_other_traffic(host, timeout_ms),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn runtime() -> Result<Runtime, String> {
    Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))
}

fn cmd_run(config_path: &PathBuf) -> Result<(), String> {
    let cfg = config::load(config_path).map_err(|e| format!("Failed to load config: {}", e))?;
    init_logging(Some(&cfg.logging));
    info!("Loaded {}", config_path.display());

    let validation = config::validate(&cfg);
    validation.print_diagnostics();
    if validation.has_errors() {
        return Err("Validation failed".to_string());
    }

    let rt = runtime()?;
    rt.block_on(async move {
        let metrics = Arc::new(MetricsRegistry::new());
        let (control, reader) = new_tables();
        let control = control.with_metrics(metrics.clone());
        config::install(&cfg, &control).map_err(|e| e.to_string())?;

        let pipeline = Pipeline::new(reader, cfg.pipeline.into(), metrics.clone());
        let mut switch = Switch::new(pipeline, metrics.clone());

        for port in &cfg.ports {
            info!("Binding port {} to {}...", port.id, port.interface);
            let socket = AfPacketSocket::bind(&port.interface).map_err(|e| {
                format!(
                    "Failed to bind to {}: {}. Run with root privileges.",
                    port.interface, e
                )
            })?;
            info!(
                "Port {} bound to {} (ifindex {})",
                port.id,
                socket.name(),
                socket.ifindex()
            );
            switch
                .add_port(port.id, socket)
                .map_err(|e| e.to_string())?;
        }

        let mut stats = tokio::time::interval(Duration::from_secs(STATS_INTERVAL_SECS));
        let running = switch.run();
        tokio::pin!(running);

        loop {
            tokio::select! {
                result = &mut running => {
                    return result.map_err(|e| e.to_string());
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    log_metrics(&metrics);
                    return Ok(());
                }
                _ = stats.tick() => log_metrics(&metrics),
            }
        }
    })
}

fn log_metrics(metrics: &MetricsRegistry) {
    let summary: Vec<String> = metrics
        .export()
        .into_iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    info!("stats: {}", summary.join(" "));
}

fn cmd_config_validate(config_path: &PathBuf) -> Result<(), String> {
    println!("[INFO] Validating {}...", config_path.display());

    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        Err("Validation failed".to_string())
    } else {
        println!("[INFO] Configuration is valid");
        Ok(())
    }
}

fn cmd_server(bind: SocketAddr, pairs: &[String]) -> Result<(), String> {
    let store = KvStore::from_pairs(pairs).map_err(|e| e.to_string())?;
    let backend = Backend::new(store);

    runtime()?
        .block_on(backend.serve(bind))
        .map_err(|e| e.to_string())
}

fn cmd_client(server: SocketAddr, key: u32, timeout_ms: u64) -> Result<(), String> {
    let result = runtime()?
        .block_on(kv::lookup(server, key, Duration::from_millis(timeout_ms)))
        .map_err(|e| e.to_string())?;
    println!("{}", result);
    Ok(())
}

fn cmd_other_traffic(host: IpAddr, timeout_ms: u64) -> Result<(), String> {
    let answered = runtime()?
        .block_on(kv::send_other_traffic(host, Duration::from_millis(timeout_ms)))
        .map_err(|e| e.to_string())?;
    if answered {
        println!("Unexpected reply");
    } else {
        println!("Timeout: not in forwarding table");
    }
    Ok(())
}
