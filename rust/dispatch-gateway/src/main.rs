// dispatch-gateway: process entry point. Loads configuration, wires the
// registry/model pools/scheduler/plugin loader together, and serves the
// HTTP surface (§6). Grounded on `knhk-sidecar::main`'s
// config-then-wire-then-serve shape.

use dispatch_core::{Endpoint, EndpointPool, ModelRegistry, Registry};
use dispatch_gateway::{routes, state::AppState};
use dispatch_plugins::PluginLoader;
use dispatch_scheduler::Scheduler;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = dispatch_config::Config::load()?;
    init_tracing(&config);

    tracing::info!(
        bind_address = %config.server.bind_address,
        workers = config.server.workers,
        queue_size = config.server.queue_size,
        "starting dispatch gateway",
    );

    let mut models = ModelRegistry::new();
    for (name, pool_config) in &config.model_api_pools {
        let endpoints = pool_config
            .endpoints
            .iter()
            .map(|e| Endpoint {
                url: e.url.clone(),
                credential: e.apikey.clone(),
            })
            .collect();
        let pool = EndpointPool::new(name.clone(), pool_config.base.clone(), endpoints)?;
        models = models.with_pool(name.clone(), Arc::new(pool));
    }
    let models = Arc::new(models);

    let registry = Arc::new(Registry::new());

    let plugin_loader = Arc::new(PluginLoader::new(
        config.plugin_dir.clone(),
        Arc::clone(&registry),
        Arc::clone(&models),
    ));
    if let Err(err) = plugin_loader.scan_and_load_all().await {
        tracing::warn!(error = %err, plugin_dir = %config.plugin_dir, "initial plugin scan failed");
    }
    tokio::spawn({
        let plugin_loader = Arc::clone(&plugin_loader);
        async move {
            if let Err(err) = plugin_loader.watch().await {
                tracing::error!(error = %err, "plugin directory watcher stopped");
            }
        }
    });

    let scheduler = Arc::new(Scheduler::start(
        Arc::clone(&registry),
        config.server.workers,
        config.server.queue_size,
    ));

    let app_state = AppState {
        scheduler,
        registry,
        default_flow: config.default_flow.clone(),
        default_timeout: Duration::from_secs(config.server.default_timeout_secs),
        max_timeout: Duration::from_secs(config.server.max_timeout_secs),
    };

    let app = routes::router(app_state);
    let listener = tokio::net::TcpListener::bind(config.server.bind_address.as_str()).await?;
    tracing::info!(addr = %config.server.bind_address, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &dispatch_config::Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_dev {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}
