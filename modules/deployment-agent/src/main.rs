use agent_runtime::metrics::build_sink;
use agent_runtime::{fatal, health, shutdown::shutdown_signal, telemetry, AgentRuntime, RuntimeConfig};
use deployment_agent::{registry, DeploymentAgent, AGENT};
use integrations::{GitHubClient, SlackNotifier};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    tracing::info!(agent = AGENT, "Starting deployment agent...");

    let config = RuntimeConfig::from_env(AGENT)
        .unwrap_or_else(|e| fatal("Failed to load runtime configuration", e));
    let mut runtime = AgentRuntime::new(AGENT, config)
        .unwrap_or_else(|e| fatal("Failed to create agent runtime", e));

    let store = agent_store::from_env()
        .await
        .unwrap_or_else(|e| fatal("Failed to open record store", e));
    let code_host = GitHubClient::from_env(AGENT)
        .unwrap_or_else(|e| fatal("Failed to configure GitHub client", e));
    let notifier = SlackNotifier::from_env()
        .unwrap_or_else(|e| fatal("Failed to configure Slack client", e));
    let metrics = build_sink(&runtime.config().metrics);

    runtime
        .connect()
        .await
        .unwrap_or_else(|e| fatal("Failed to connect to broker", e));

    if let Some(port) = runtime.config().health_port {
        let app = runtime.health_router();
        tokio::spawn(async move {
            if let Err(e) = health::serve(app, port).await {
                tracing::error!(error = %e, "Health server stopped");
            }
        });
    }

    let agent = Arc::new(DeploymentAgent {
        store,
        code_host: Arc::new(code_host),
        notifier: Arc::new(notifier),
        metrics,
    });

    if let Err(e) = runtime.run(registry(agent), shutdown_signal()).await {
        fatal("Deployment agent stopped", e);
    }
    tracing::info!(agent = AGENT, "Deployment agent shut down");
}
