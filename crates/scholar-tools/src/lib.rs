mod arxiv;
mod crawler;
mod ontology;
mod pdf;
mod web_search;

pub use arxiv::{ArxivTool, PaperMeta};
pub use crawler::{CrawlReport, CrawledPage, CrawlerTool, PageMetadata};
pub use ontology::{OntologySchema, OntologyTool, OpportunityRecord, ValidationReport};
pub use pdf::PdfTool;
pub use web_search::WebSearchTool;

use async_trait::async_trait;
use scholar_common::ToolResult;
use std::collections::HashMap;

/// Parameters for one tool invocation, as extracted by the router or
/// assembled by an agent.
#[derive(Debug, Clone, Default)]
pub struct ToolInput {
    pub args: HashMap<String, String>,
}

impl ToolInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(|s| s.as_str())
    }
}

/// A single-call adapter to one external capability. Each wrapper performs
/// exactly one kind of external call and maps the outcome to a
/// [`ToolResult`]; no wrapper retries, caches, or rate-limits beyond what
/// the underlying library does by default.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    async fn invoke(&self, input: ToolInput) -> ToolResult;
}
