/* 📖 # How does the rendezvous binary pick its settings?

Settings come from three layers, later ones winning:

1. built-in defaults (`127.0.0.1:3000`, no idle expiry)
2. an optional TOML file given with `--config`
3. command line flags

The process then serves until it is killed. All state lives in memory and is lost on exit.

Exit codes:
- 0: server shut down cleanly
- 1: configuration or startup error
*/

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use rendezvous_base::tracing::init_tracing;
use rendezvous_base::{PalHandle, RealPal, RendezvousResult};
use rendezvous_engine::{
    IdleSweeper, IdleSweeperConfig, InMemoryStore, RendezvousConfig, RendezvousService,
    StoreHandle, load_config,
};

#[derive(Parser, Debug)]
#[command(name = "rendezvous")]
#[command(about = "In-memory rendezvous service pairing waiting and calling parties", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Drop waiting entries older than this many seconds
    #[arg(long)]
    idle_expiry_secs: Option<u64>,

    /// Seconds between idle sweeps
    #[arg(long)]
    sweep_interval_secs: Option<u64>,
}

impl Cli {
    fn resolve_config(&self, pal: &PalHandle) -> RendezvousResult<RendezvousConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(pal, path)?,
            None => RendezvousConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.idle_expiry_secs.is_some() {
            config.idle_expiry_secs = self.idle_expiry_secs;
        }
        if let Some(interval) = self.sweep_interval_secs {
            config.sweep_interval_secs = interval;
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(cli: Cli) -> RendezvousResult<()> {
    let pal = PalHandle::new(RealPal::new());
    let config = cli.resolve_config(&pal)?;

    let store = StoreHandle::new(InMemoryStore::new());
    let service = Arc::new(RendezvousService::new(store.clone()));
    let server = pal.start_http_server(service, config.http_server_config())?;

    let sweeper = match config.idle_expiry() {
        Some(max_idle) => Some(IdleSweeper::start(IdleSweeperConfig::new(
            store,
            config.sweep_interval(),
            max_idle,
            Arc::clone(server.shutdown_flag()),
        ))?),
        None => None,
    };

    server.join()?;
    if let Some(sweeper) = sweeper {
        sweeper.join()?;
    }
    info!("Server stopped");
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Error: Failed to initialize logging: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
