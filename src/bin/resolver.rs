//! # Resolver Binary
//!
//! Process entrypoint: loads configuration, wires the concrete
//! [`AppProvider`], and runs the resolver lifecycle until a shutdown signal
//! arrives.

use resolver::cache::InMemoryCache;
use resolver::config::Config;
use resolver::did_resolver::CachedDidResolver;
use resolver::indexer::http::HttpIndexerClient;
use resolver::provider::AppProvider;
use resolver::store::InMemoryStore;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let indexer = HttpIndexerClient::new(config.indexer_base_url.clone());
    let cache = InMemoryCache::new();
    let store = InMemoryStore::new();
    let did_resolver = CachedDidResolver::new(InMemoryCache::new(), config.object_cache_ttl);
    let provider = AppProvider::new(indexer, cache, store, did_resolver);

    let shutdown = CancellationToken::new();
    let shutdown_for_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_for_signal.cancel();
        }
    });

    if let Err(e) = resolver::resolver::run(provider, config, shutdown).await {
        error!(error = %e, "resolver exited with an error");
        std::process::exit(1);
    }
}
