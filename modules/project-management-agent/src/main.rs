use agent_runtime::metrics::build_sink;
use agent_runtime::scheduler::{parse_schedule, spawn_trigger};
use agent_runtime::{env_or, fatal, health, shutdown::shutdown_signal, telemetry, AgentRuntime, RuntimeConfig};
use integrations::{JiraClient, JiraConfig};
use project_management_agent::{registry, ProjectManagementAgent, AGENT, DEFAULT_SYNC_CRON};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    tracing::info!(agent = AGENT, "Starting project management agent...");

    let config = RuntimeConfig::from_env(AGENT)
        .unwrap_or_else(|e| fatal("Failed to load runtime configuration", e));
    let mut runtime = AgentRuntime::new(AGENT, config)
        .unwrap_or_else(|e| fatal("Failed to create agent runtime", e));

    let schedule = parse_schedule(&env_or("PM_SYNC_CRON", DEFAULT_SYNC_CRON))
        .unwrap_or_else(|e| fatal("Invalid PM_SYNC_CRON", e));

    let store = agent_store::from_env()
        .await
        .unwrap_or_else(|e| fatal("Failed to open record store", e));
    let jira_config = JiraConfig::from_env().unwrap_or_else(|e| fatal("Failed to configure Jira client", e));
    let project_key = jira_config.project_key.clone();
    let tracker = JiraClient::new(jira_config).unwrap_or_else(|e| fatal("Failed to configure Jira client", e));
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

    let agent = Arc::new(ProjectManagementAgent {
        store,
        tracker: Arc::new(tracker),
        project_key,
        metrics,
    });

    let sync_agent = agent.clone();
    let sync = spawn_trigger("project-sync", schedule, move || {
        let agent = sync_agent.clone();
        async move { agent.sync_updates().await.map(|_| ()) }
    });

    let result = runtime.run(registry(agent), shutdown_signal()).await;
    sync.abort();
    if let Err(e) = result {
        fatal("Project management agent stopped", e);
    }
    tracing::info!(agent = AGENT, "Project management agent shut down");
}
