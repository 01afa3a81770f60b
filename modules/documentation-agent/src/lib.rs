//! # Documentation Agent
//!
//! `documentation_update` -> create or update the project's wiki page in
//! space [`SPACE`], then mark the stored document processed.
//!
//! Both steps are upserts, so a redelivered update rewrites the same page
//! (one more wiki version) and leaves the document flag set.

use agent_runtime::{parse_payload, tag, HandlerError, HandlerRegistry, MetricsSink};
use agent_store::RecordStore;
use integrations::Wiki;
use platform_contracts::payloads::Documentation;
use platform_contracts::{agents, EventType};
use std::sync::Arc;

pub const AGENT: &str = agents::DOCUMENTATION;

pub const SPACE: &str = "DEV";

pub fn page_title(project_id: &str) -> String {
    format!("Project Documentation: {}", project_id)
}

/// Wrap plain content as a storage-format paragraph
pub fn storage_body(content: &str) -> String {
    format!("<p>{}</p>", content)
}

pub struct DocumentationAgent {
    pub store: Arc<dyn RecordStore>,
    pub wiki: Arc<dyn Wiki>,
    pub metrics: Arc<dyn MetricsSink>,
}

impl DocumentationAgent {
    pub async fn on_documentation_update(&self, doc: Documentation) -> Result<(), HandlerError> {
        tracing::info!(document_id = %doc.document_id, project_id = %doc.project_id, "Updating documentation");

        let title = page_title(&doc.project_id);
        let body = storage_body(&doc.content);

        match self.wiki.find_page(SPACE, &title).await? {
            Some(page) => {
                self.wiki.update_page(&page, SPACE, &title, &body).await?;
                tracing::info!(page_id = %page.id, version = page.version + 1, "Wiki page updated");
            }
            None => {
                let id = self.wiki.create_page(SPACE, &title, &body).await?;
                tracing::info!(page_id = %id, "Wiki page created");
            }
        }

        if !self.store.mark_document_processed(&doc.document_id).await? {
            tracing::warn!(document_id = %doc.document_id, "No stored document to mark processed");
        }

        self.metrics.gauge(
            "ai_agent.documentation.documents_updated",
            1.0,
            &[tag("agent", AGENT), tag("project", &doc.project_id)],
        );
        Ok(())
    }
}

pub fn registry(agent: Arc<DocumentationAgent>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.on(EventType::DocumentationUpdate, move |data| {
        let agent = agent.clone();
        async move { agent.on_documentation_update(parse_payload(data)?).await }
    });
    registry
}
