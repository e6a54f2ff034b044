mod error;
mod routes;
mod state;

use clap::Parser;
use indexsync_core::{open_store, CatalogRepository, Config, Dispatcher};
use state::{AppState, SharedState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "indexsync-service")]
#[command(about = "Accept repository change events over HTTP and apply them to the index")]
#[command(version)]
struct Args {
    /// Config file (defaults are used if it does not exist)
    #[arg(long, env = "INDEXSYNC_CONFIG", default_value = "indexsync.toml")]
    config: PathBuf,

    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    #[arg(long, default_value_t = 3000)]
    port: u16,
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("indexsync-service: {}", err);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default(&args.config)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // The http store wraps a blocking client, so it is built (and later
    // dropped) outside the async runtime.
    let store = open_store(&config.store)?;
    let dispatcher = Dispatcher::new(CatalogRepository, config.repository.clone(), store);
    let state: SharedState = Arc::new(AppState::new(dispatcher));

    let app = routes::router(Arc::clone(&state));
    let addr = format!("{}:{}", args.bind, args.port);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(%addr, catalog = %config.repository.catalog_path.display(), "indexsync-service listening");
        axum::serve(listener, app).await
    })?;
    drop(runtime);
    drop(state);
    Ok(())
}
