//! Process entry point: parse `Config`, stand up tracing, build `AppState`
//! and the axum `Router`, and serve (spec §2.1).

use clap::Parser;
use smg_gateway::app::AppState;
use smg_gateway::config::Config;
use smg_gateway::routes;
use smg_gateway::version;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_filter.clone()))
        .init();

    let (host, port) = split_listen_addr(&config.listen_addr);
    version::print_banner(&host, port, &format!("{:?}", config.upstream_protocol));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    let app_state = AppState::new(config);
    let router = routes::build_router(app_state);

    tracing::info!(addr = %listener.local_addr()?, "gateway listening");
    axum::serve(listener, router).await?;
    Ok(())
}

fn split_listen_addr(addr: &str) -> (String, u16) {
    match addr.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(0)),
        None => (addr.to_string(), 0),
    }
}
