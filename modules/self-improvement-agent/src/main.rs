use agent_runtime::metrics::build_sink;
use agent_runtime::scheduler::{parse_schedule, spawn_trigger};
use agent_runtime::{env_or, fatal, health, shutdown::shutdown_signal, telemetry, AgentRuntime, RuntimeConfig};
use integrations::{DatadogLogs, GitHubClient};
use self_improvement_agent::{registry, SelfImprovementAgent, AGENT, DEFAULT_HEALTH_CHECK_CRON};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    tracing::info!(agent = AGENT, "Starting self-improvement agent...");

    let config = RuntimeConfig::from_env(AGENT)
        .unwrap_or_else(|e| fatal("Failed to load runtime configuration", e));
    let mut runtime = AgentRuntime::new(AGENT, config)
        .unwrap_or_else(|e| fatal("Failed to create agent runtime", e));

    let schedule = parse_schedule(&env_or("HEALTH_CHECK_CRON", DEFAULT_HEALTH_CHECK_CRON))
        .unwrap_or_else(|e| fatal("Invalid HEALTH_CHECK_CRON", e));

    let code_host = GitHubClient::from_env(AGENT)
        .unwrap_or_else(|e| fatal("Failed to configure GitHub client", e));
    let monitor = DatadogLogs::from_env()
        .unwrap_or_else(|e| fatal("Failed to configure Datadog client", e));
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

    let agent = Arc::new(SelfImprovementAgent {
        code_host: Arc::new(code_host),
        monitor: Arc::new(monitor),
        metrics,
    });

    let check_agent = agent.clone();
    let checks = spawn_trigger("health-check", schedule, move || {
        let agent = check_agent.clone();
        async move { agent.health_check().await }
    });

    let result = runtime.run(registry(agent), shutdown_signal()).await;
    checks.abort();
    if let Err(e) = result {
        fatal("Self-improvement agent stopped", e);
    }
    tracing::info!(agent = AGENT, "Self-improvement agent shut down");
}
