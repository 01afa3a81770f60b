use agent_runtime::metrics::build_sink;
use agent_runtime::{env_or, fatal, health, shutdown::shutdown_signal, telemetry, AgentRuntime, RuntimeConfig};
use client_portal::{registry, routes, PortalState, AGENT, DEFAULT_PORT};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    tracing::info!(agent = AGENT, "Starting client portal...");

    let config = RuntimeConfig::from_env(AGENT)
        .unwrap_or_else(|e| fatal("Failed to load runtime configuration", e));
    let mut runtime = AgentRuntime::new(AGENT, config)
        .unwrap_or_else(|e| fatal("Failed to create agent runtime", e));

    let port: u16 = env_or("PORT", &DEFAULT_PORT.to_string())
        .parse()
        .unwrap_or_else(|e| fatal("PORT must be a valid port number", e));

    let store = agent_store::from_env()
        .await
        .unwrap_or_else(|e| fatal("Failed to open record store", e));
    let metrics = build_sink(&runtime.config().metrics);

    let publisher = runtime
        .connect()
        .await
        .unwrap_or_else(|e| fatal("Failed to connect to broker", e));

    // Inbound routes share the listener with health and metrics
    let app = routes(PortalState {
        store,
        publisher,
        metrics,
    })
    .merge(runtime.health_router());

    tokio::spawn(async move {
        if let Err(e) = health::serve(app, port).await {
            fatal("Client portal HTTP server stopped", e);
        }
    });

    if let Err(e) = runtime.run(registry(), shutdown_signal()).await {
        fatal("Client portal stopped", e);
    }
    tracing::info!(agent = AGENT, "Client portal shut down");
}
