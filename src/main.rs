// src/main.rs
//
// iiif-pipe server binary.

// jemalloc is not supported on Windows/MSVC
#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use clap::Parser;
use iiif_pipe::config::ServerConfig;
use iiif_pipe::engine::Processor;
use iiif_pipe::server::{self, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        ?config,
        "starting"
    );

    // The blocking client owns an internal runtime; build it outside ours.
    let resolver = config.build_resolver()?;
    let state = AppState::new(
        Arc::new(resolver),
        Processor::new(config.limits()),
        config.server_options(),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(config.listen).await?;
        server::serve(listener, server::router(state)).await
    })?;
    Ok(())
}
