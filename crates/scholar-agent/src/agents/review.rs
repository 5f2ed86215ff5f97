use super::{single_chunk, Agent, AgentRequest};
use crate::registry::{AgentKind, AgentRegistry};
use async_trait::async_trait;
use scholar_common::{Result, ScholarError};
use scholar_core::{DocumentRef, Session};
use scholar_llm::{LLMProvider, Message, TokenStream};
use scholar_tools::{PdfTool, Tool, ToolInput, WebSearchTool};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// How the paper should be reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewMode {
    /// 3-4 bullet points.
    Rapid,
    /// Paragraph-style summary.
    Academic,
    /// Academic summary plus supporting web links.
    Enhanced,
    /// Keyword-frequency breakdown.
    Visual,
}

impl ReviewMode {
    pub fn from_utterance(utterance: &str) -> Option<Self> {
        let lowered = utterance.to_lowercase();
        if lowered.contains("rapid") {
            Some(ReviewMode::Rapid)
        } else if lowered.contains("enhanced") {
            Some(ReviewMode::Enhanced)
        } else if lowered.contains("visual") {
            Some(ReviewMode::Visual)
        } else if lowered.contains("academic") {
            Some(ReviewMode::Academic)
        } else {
            None
        }
    }
}

/// Reviews a linked or previously loaded document in one of four modes.
pub struct ReviewAgent {
    llm: Arc<dyn LLMProvider>,
    pdf: PdfTool,
    web: WebSearchTool,
    system_prompt: &'static str,
}

impl ReviewAgent {
    pub fn new(llm: Arc<dyn LLMProvider>, registry: &AgentRegistry) -> Self {
        Self {
            llm,
            pdf: PdfTool::new(),
            web: WebSearchTool::new(),
            system_prompt: registry.get(AgentKind::PaperReview).system_prompt,
        }
    }

    async fn document_text(&self, doc: &DocumentRef) -> Result<String> {
        let input = match doc {
            DocumentRef::Url(url) => ToolInput::new().with("url", url),
            DocumentRef::Path(path) => ToolInput::new().with("path", path),
        };
        self.pdf.invoke(input).await.into_payload()
    }

    /// Paragraph summary through the LLM, degrading to a plain excerpt
    /// when the model is unavailable.
    async fn academic_summary(&self, text: &str) -> String {
        let excerpt: String = text.chars().take(6000).collect();
        let messages = vec![
            Message::system(self.system_prompt),
            Message::user(format!(
                "Summarize this paper in one coherent paragraph, covering its aim, method, and findings:\n\n{}",
                excerpt
            )),
        ];

        match self.llm.generate_with_context(messages).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!("Summary LLM call failed, falling back to excerpt: {}", e);
                format!("Summary:\n{}...", text.chars().take(1000).collect::<String>())
            }
        }
    }
}

#[async_trait]
impl Agent for ReviewAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::PaperReview
    }

    async fn handle(
        &self,
        request: &AgentRequest,
        session: &mut Session,
    ) -> Result<TokenStream> {
        let doc = request
            .params
            .url
            .clone()
            .map(DocumentRef::Url)
            .or_else(|| session.active_document.clone())
            .ok_or_else(|| {
                ScholarError::MissingParameter(
                    "a document to review (a PDF link, or review one first)".to_string(),
                )
            })?;

        let mode = request.params.review_mode.unwrap_or(ReviewMode::Academic);
        info!("Reviewing {} in {:?} mode", doc.display(), mode);

        let text = self.document_text(&doc).await?;

        let review = match mode {
            ReviewMode::Rapid => summarize_rapid(&text),
            ReviewMode::Academic => self.academic_summary(&text).await,
            ReviewMode::Enhanced => {
                let summary = self.academic_summary(&text).await;
                let keywords: String =
                    summary.split_whitespace().take(6).collect::<Vec<_>>().join(" ");
                let links = self.web.invoke(ToolInput::new().with("query", keywords)).await;
                if links.is_ok() {
                    format!(
                        "Summary with Web Enhancement:\n{}\n\nAdditional Links:\n{}",
                        summary, links.payload
                    )
                } else {
                    warn!("Web enhancement failed: {:?}", links.detail);
                    summary
                }
            }
            ReviewMode::Visual => keyword_breakdown(&text),
        };

        session.active_document = Some(doc);
        session.last_review = Some(review.clone());

        Ok(single_chunk(review))
    }
}

/// First few sentences as bullet points.
fn summarize_rapid(text: &str) -> String {
    text.split(". ")
        .take(4)
        .map(|line| format!("- {}", line.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Top keyword frequencies rendered as markdown text bars.
fn keyword_breakdown(text: &str) -> String {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for word in text.to_lowercase().split_whitespace() {
        let cleaned = word.trim_matches(|c: char| !c.is_alphanumeric());
        if cleaned.len() > 4 {
            *freq.entry(cleaned.to_string()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(5);

    if ranked.is_empty() {
        return "The document contained no keywords to chart.".to_string();
    }

    let max = ranked[0].1.max(1);
    let mut out = String::from("## Top Keywords in Summary\n\n");
    for (word, count) in &ranked {
        let bar_len = (count * 20 / max).max(1);
        out.push_str(&format!(
            "`{:<16}` {} {}\n",
            word,
            "█".repeat(bar_len),
            count
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing_from_utterances() {
        assert_eq!(
            ReviewMode::from_utterance("rapid review please"),
            Some(ReviewMode::Rapid)
        );
        assert_eq!(
            ReviewMode::from_utterance("give me the enhanced summary"),
            Some(ReviewMode::Enhanced)
        );
        assert_eq!(ReviewMode::from_utterance("summarize this"), None);
    }

    #[test]
    fn rapid_summary_is_bulleted() {
        let text = "First finding. Second finding. Third point. Fourth point. Fifth ignored.";
        let summary = summarize_rapid(text);
        assert_eq!(summary.lines().count(), 4);
        assert!(summary.starts_with("- First finding"));
    }

    #[test]
    fn keyword_breakdown_ranks_by_frequency() {
        let text = "transformer transformer transformer attention attention encoder";
        let breakdown = keyword_breakdown(text);
        let first_bar = breakdown.lines().find(|l| l.contains('█')).unwrap();
        assert!(first_bar.contains("transformer"));
        assert!(first_bar.contains('3'));
    }

    #[test]
    fn keyword_breakdown_handles_empty_input() {
        assert!(!keyword_breakdown("a b c").contains('█'));
    }
}
