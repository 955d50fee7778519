use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use dnspy::builder::build_plugin_list;
use dnspy::config::args::Args;
use dnspy::config::{self, describe_schema};
use dnspy::errors::*;
use dnspy::listener::Listener;
use dnspy::plugins::descriptors;
use dnspy::store::{KvStore, Store};
use snafu::ResultExt;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();

    if let Some(env_file) = &args.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            eprintln!("failed to load env file {}: {e}", env_file.display());
        }
    }

    env_logger::Builder::from_default_env()
        .format_timestamp(None)
        .init();

    let descriptors = descriptors();

    if args.list_env {
        let schema = describe_schema(&descriptors);
        println!("{}", serde_json::to_string_pretty(&schema).expect("schema always serializes"));
        return Ok(());
    }

    let settings = config::load(&descriptors).context(ConfigSnafu)?;
    config::write_snapshot(&settings).context(ConfigSnafu)?;

    let store: Option<Arc<dyn KvStore>> = match &settings.redis_uri {
        Some(uri) => Some(Arc::new(Store::connect(uri).await.context(StoreSnafu)?)),
        None => None,
    };

    let plugins = build_plugin_list(&settings, store.as_ref()).context(BuilderSnafu)?;
    let plugins = Arc::new(plugins);

    let local_addr = SocketAddr::from((settings.local_ip, settings.local_port));
    let upstream_addr = SocketAddr::from((settings.upstream_ip, settings.upstream_port));

    let listener = Listener::bind(local_addr, upstream_addr, settings.upstream_timeout, Arc::clone(&plugins))
        .await
        .context(ListenSnafu)?;

    listener.run(shutdown_signal()).await;

    for plugin in plugins.iter() {
        plugin.shutdown();
    }
    config::remove_snapshot();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
