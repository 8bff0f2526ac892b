use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{value_parser, Arg, Command};
use config::{Config, File as ConfigFile};
use rendez_registry::{NodeDirectory, PortAllocator, Registry, Topology};
use rendez_rpc::{start_server, AppState};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod selfaddr;

use selfaddr::AddrMode;

const DEFAULT_EXTERNAL_IP_SERVICES: &[&str] =
    &["https://api.ipify.org", "https://ifconfig.me/ip"];

/// Application configuration
#[derive(Debug, Clone)]
struct AppConfig {
    config_path: Option<PathBuf>,
    node_id: String,
    host: String,
    port: u16,
    addr_mode: AddrMode,
    external_ip_services: Vec<String>,
    peer_port_base: u16,
    log_level: String,
    log_format: String,
}

impl AppConfig {
    fn load(config_path_override: Option<&str>) -> Result<Self> {
        let resolved_path = if let Some(path) = config_path_override {
            let path = PathBuf::from(path);
            if !path.exists() {
                anyhow::bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            Some(path)
        } else {
            let path = PathBuf::from("config").join("rendez.toml");
            if path.exists() {
                Some(path)
            } else {
                None
            }
        };

        let mut builder = Config::builder();

        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }

        builder = builder.add_source(config::Environment::with_prefix("RENDEZ"));

        let config = builder.build()?;

        let mut external_ip_services: Vec<String> =
            get_string_value(&config, &["EXTERNAL_IP_SERVICES", "net.external_ip_services"])
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

        if external_ip_services.is_empty() {
            external_ip_services = DEFAULT_EXTERNAL_IP_SERVICES
                .iter()
                .map(|s| s.to_string())
                .collect();
        }

        let addr_mode_value = get_string_value(&config, &["ADDR_MODE", "net.addr_mode"])
            .unwrap_or_else(|| "external".to_string());

        Ok(Self {
            config_path: resolved_path,
            node_id: get_string_value(&config, &["NODE_ID", "node.id"])
                .unwrap_or_else(|| "rendez-registry".to_string()),
            host: get_string_value(&config, &["HOST", "http.host"])
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: get_string_value(&config, &["PORT", "http.port"])
                .unwrap_or_else(|| "7600".to_string())
                .parse()?,
            addr_mode: AddrMode::from_value(&addr_mode_value),
            external_ip_services,
            peer_port_base: get_string_value(&config, &["PEER_PORT_BASE", "ports.base"])
                .unwrap_or_else(|| "3499".to_string())
                .parse()?,
            log_level: get_string_value(&config, &["LOG_LEVEL", "log.level"])
                .unwrap_or_else(|| "info".to_string()),
            log_format: get_string_value(&config, &["LOG_FORMAT", "log.format"])
                .unwrap_or_else(|| "pretty".to_string()),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            anyhow::bail!("NODE_ID must not be empty");
        }
        if self.host.trim().is_empty() {
            anyhow::bail!("HOST must not be empty");
        }
        if self.port == 0 {
            anyhow::bail!("PORT must be greater than zero");
        }
        Ok(())
    }

    fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn load_config_with_overrides(matches: &clap::ArgMatches) -> Result<AppConfig> {
    let config_path = matches
        .get_one::<String>("config")
        .map(|value| value.as_str());
    let mut config = AppConfig::load(config_path)?;
    apply_overrides(matches, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(matches: &clap::ArgMatches, config: &mut AppConfig) {
    if let Some(host) = matches.get_one::<String>("host") {
        config.host = host.clone();
    }

    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }

    if let Some(addr_mode) = matches.get_one::<String>("addr-mode") {
        config.addr_mode = AddrMode::from_value(addr_mode);
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

async fn check_status(config: &AppConfig, health_path: &str) -> Result<()> {
    let mut path = health_path.to_string();
    if !path.starts_with('/') {
        path = format!("/{path}");
    }
    let url = format!("http://{}:{}{}", config.host, config.port, path);
    let response = reqwest::Client::new().get(&url).send().await?;
    let status = response.status();
    let body = response.text().await?;
    println!("GET {url} -> {status}");
    println!("{body}");
    if status.is_success() {
        Ok(())
    } else {
        anyhow::bail!("Health check failed with status {status}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("rendez-node")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Rendezvous registry for peer-to-peer overlays")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .global(true),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Override the HTTP bind host")
                .global(true),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Override the HTTP port")
                .global(true),
        )
        .arg(
            Arg::new("addr-mode")
                .long("addr-mode")
                .value_name("MODE")
                .value_parser(["local", "external"])
                .help("Self-address resolution strategy")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level")
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Select log output format")
                .global(true),
        )
        .subcommand(
            Command::new("start").about("Start the registry using the provided configuration"),
        )
        .subcommand(
            Command::new("status")
                .about("Check the /health endpoint of a running registry")
                .arg(
                    Arg::new("health-path")
                        .long("health-path")
                        .value_name("PATH")
                        .default_value("/health")
                        .help("Health endpoint path to query"),
                ),
        )
        .get_matches();

    if let Some(status_matches) = matches.subcommand_matches("status") {
        let config = load_config_with_overrides(status_matches)?;
        let health_path = status_matches
            .get_one::<String>("health-path")
            .map(|value| value.as_str())
            .unwrap_or("/health");
        check_status(&config, health_path).await?;
        return Ok(());
    }

    let start_matches = matches.subcommand_matches("start").unwrap_or(&matches);
    let config = load_config_with_overrides(start_matches)?;

    init_logging(&config);

    info!("Starting rendez registry: {}", config.node_id);
    if let Some(path) = &config.config_path {
        info!("Config file: {}", path.display());
    } else {
        info!("Config file: (built-in defaults)");
    }
    info!("Address mode: {}", config.addr_mode);
    info!("Peer port allocation starts above {}", config.peer_port_base);

    let registry = Arc::new(Registry {
        topology: Topology::new(),
        ports: PortAllocator::starting_at(config.peer_port_base),
        directory: NodeDirectory::new(),
    });

    // Self-address is advisory: resolution failure must not stop startup.
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    match selfaddr::resolve(config.addr_mode, &config.external_ip_services, &client).await {
        Ok(ip) => info!("Registry reachable at http://{}:{}", ip, config.port),
        Err(err) => warn!(
            "Self-address resolution failed ({}); falling back to bind address {}",
            err, config.host
        ),
    }

    let state = AppState::new(registry, config.node_id.clone());
    let listen_addr = config.listen_addr();
    info!("Starting HTTP server on {}", listen_addr);

    let server = tokio::spawn(async move {
        if let Err(err) = start_server(state, &listen_addr).await {
            error!("HTTP server error: {err}");
        }
    });

    info!("Rendez registry is ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down rendez registry");
    server.abort();

    Ok(())
}
