use clap::Parser;
use radius_engine::{Config, RadiusServer, ServerConfig};
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// RADIUS server driven by per-section policies
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "radius-engine")]
struct Cli {
    /// Path to configuration file
    #[arg(value_name = "CONFIG", default_value = "config.json")]
    config_path: String,

    /// Validate configuration and exit (doesn't start server)
    #[arg(short = 'c', long)]
    validate: bool,
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn print_summary(config: &Config) {
    println!("Configuration OK");
    println!("  Virtual server: {}", config.virtual_server);
    println!("  Listen: {}:{} (udp)", config.listen.address, config.listen.port);
    if let Some(tcp) = &config.tcp_listen {
        println!("  Listen: {}:{} (tcp)", tcp.address, tcp.port);
    }
    println!("  Clients: {}", config.clients.len());
    println!("  Users: {}", config.users.len());
    println!("  Log level: {}", config.log_level.as_deref().unwrap_or("info"));
    if let Some(path) = &config.audit_log_path {
        println!("  Audit log: {}", path);
    }

    let mut sections: Vec<_> = config.sections.keys().collect();
    sections.sort();
    println!("Sections:");
    for name in sections {
        println!("  {}", name);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            if cli.validate {
                eprintln!("Configuration validation failed: {}", e);
                process::exit(1);
            }
            init_tracing("info");
            warn!("Could not load config file from {}: {}", cli.config_path, e);
            if std::path::Path::new(&cli.config_path).exists() {
                process::exit(1);
            }

            info!("Creating example configuration at: {}", cli.config_path);
            if let Err(e) = Config::example().to_file(&cli.config_path) {
                error!("Error creating example config: {}", e);
                process::exit(1);
            }
            info!("Please edit {} and restart the server", cli.config_path);
            process::exit(0);
        }
    };

    if cli.validate {
        print_summary(&config);
        process::exit(0);
    }

    init_tracing(config.log_level.as_deref().unwrap_or("info"));
    info!("radius-engine v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from: {}", cli.config_path);

    if config.clients.is_empty() {
        warn!("No clients configured: every packet will be dropped");
    }
    for client in &config.clients {
        info!(address = %client.address, name = client.display_name(), enabled = client.enabled, "client");
    }

    let server_config = match ServerConfig::from_config(config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let server = match RadiusServer::new(server_config).await {
        Ok(srv) => srv,
        Err(e) => {
            error!("Failed to create server: {}", e);
            process::exit(1);
        }
    };

    info!("Server started, press Ctrl+C to stop");
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }
}
