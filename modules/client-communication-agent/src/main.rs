use agent_runtime::metrics::build_sink;
use agent_runtime::{env_or, fatal, health, shutdown::shutdown_signal, telemetry, AgentRuntime, RuntimeConfig};
use client_communication_agent::inbound::{self, InboundState};
use client_communication_agent::{registry, ClientCommunicationAgent, AGENT, DEFAULT_PORT};
use integrations::{GoogleWorkspace, SlackNotifier};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    tracing::info!(agent = AGENT, "Starting client communication agent...");

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
    let google = Arc::new(
        GoogleWorkspace::from_env().unwrap_or_else(|e| fatal("Failed to configure Google Workspace", e)),
    );
    let notifier = SlackNotifier::from_env()
        .unwrap_or_else(|e| fatal("Failed to configure Slack client", e));
    let metrics = build_sink(&runtime.config().metrics);

    let publisher = runtime
        .connect()
        .await
        .unwrap_or_else(|e| fatal("Failed to connect to broker", e));

    let app = inbound::routes(InboundState {
        store: store.clone(),
        publisher: publisher.clone(),
    })
    .merge(runtime.health_router());

    tokio::spawn(async move {
        if let Err(e) = health::serve(app, port).await {
            fatal("Gmail inbound listener stopped", e);
        }
    });

    let agent = Arc::new(ClientCommunicationAgent {
        store,
        mailer: google.clone(),
        calendar: google,
        notifier: Arc::new(notifier),
        publisher,
        metrics,
    });

    if let Err(e) = runtime.run(registry(agent), shutdown_signal()).await {
        fatal("Client communication agent stopped", e);
    }
    tracing::info!(agent = AGENT, "Client communication agent shut down");
}
