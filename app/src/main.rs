use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod actors;
mod bus;
mod ledger;
mod state;

use state::SystemState;
use state::config::WebserverSection;

#[derive(Parser, Debug, Clone)]
#[command(name = "banker", about = "Monopoly banker server")]
struct Config {
    /// Config file path (default: ~/.config/banker/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address for the primary web server, for this run only
    #[arg(long)]
    bind: Option<String>,

    /// Keep games in memory even if a store path is configured
    #[arg(long)]
    memory: bool,

    /// Print the `key_hash` value for a monitoring API key and exit
    #[arg(long, value_name = "KEY")]
    hash_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("banker=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!("debug logging enabled");

    let cli = Config::parse();

    if let Some(key) = cli.hash_api_key {
        println!("{}", banker::hash_api_key(&key));
        return Ok(());
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(state::config::default_config_path);

    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    let state = Arc::new(
        SystemState::new(config_path, cli.memory).context("failed to open game store")?,
    );

    tracing::info!("config: {}", state.system.path().display());

    // A config without any web server would serve nothing; restore the
    // default one and persist it so the file reflects the running state.
    if state.system.snapshot().webserver.is_empty() {
        state.system.update(|c| {
            c.webserver = banker::BankerConfig::default().webserver;
        });
    }
    if let Some(bind) = cli.bind {
        state.system.override_with(|c| {
            c.webserver
                .entry("0".into())
                .or_insert_with(|| WebserverSection {
                    name: "Web Server".into(),
                    bind: String::new(),
                })
                .bind = bind;
        });
    }

    // Start all actors from config (web servers, cleanup)
    let snap = state.system.snapshot();
    for ra in actors::resolve_actors(&snap) {
        tracing::info!("starting actor '{}' ({})", ra.id, ra.name);
        actors::start_actor(ra.id, ra.actor, &state);
    }

    rt.block_on(async { tokio::signal::ctrl_c().await })?;

    // Shutdown: end live streams first so graceful web shutdown can finish
    tracing::info!("shutting down...");
    state.ledger.hub().close();
    for id in state.actor_ids() {
        state.stop_actor(&id);
        state.remove_actor(&id);
    }

    Ok(())
}
