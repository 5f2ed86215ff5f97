use crate::agents::ReviewMode;
use crate::registry::{AgentKind, AgentRegistry};
use async_trait::async_trait;
use regex::Regex;
use scholar_common::Result;
use scholar_core::ConversationTurn;
use scholar_llm::{strip_json_fences, LLMProvider, Message};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Structured input pulled out of the utterance for the selected agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedParams {
    /// The utterance with lead-in phrasing stripped; what tools get as a
    /// search query.
    pub query: String,
    pub url: Option<String>,
    pub review_mode: Option<ReviewMode>,
}

/// What the router decided to do with one utterance.
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    Dispatch {
        kind: AgentKind,
        params: ExtractedParams,
    },
    /// A required parameter was missing; ask the user instead of invoking
    /// the agent with incomplete input.
    Clarify { message: String },
}

/// Classification strategy. Returns `None` when no agent can be selected
/// with confidence; the router then falls back to the default agent.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, utterance: &str) -> Option<AgentKind>;
}

/// Deterministic first-match-wins keyword classifier over the registry's
/// ordered trigger sets.
pub struct KeywordClassifier {
    registry: Arc<AgentRegistry>,
}

impl KeywordClassifier {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, utterance: &str) -> Option<AgentKind> {
        let lowered = utterance.to_lowercase();
        self.registry
            .descriptors()
            .iter()
            .find(|descriptor| descriptor.triggers.iter().any(|t| lowered.contains(t)))
            .map(|descriptor| descriptor.kind)
    }
}

/// Single-LLM-call classifier. Any failure (transport, quota, malformed
/// reply) degrades to `None` so routing never blocks on the model.
pub struct LlmClassifier {
    llm: Arc<dyn LLMProvider>,
    registry: Arc<AgentRegistry>,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LLMProvider>, registry: Arc<AgentRegistry>) -> Self {
        Self { llm, registry }
    }
}

#[derive(Debug, Deserialize)]
struct ClassificationReply {
    agent: String,
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    async fn classify(&self, utterance: &str) -> Option<AgentKind> {
        let catalog: Vec<String> = self
            .registry
            .descriptors()
            .iter()
            .map(|d| format!("- {:?}: {}", d.kind, d.description))
            .collect();

        let system_prompt = format!(
            r#"You are an intent classifier for a research assistant.
Select the single best agent for the user's message.

Available agents:
{}

You MUST respond with a single JSON object ONLY, matching:
{{ "agent": "literature|web_crawling|paper_review|qa" }}"#,
            catalog.join("\n")
        );

        let messages = vec![Message::system(system_prompt), Message::user(utterance)];

        let response = match self.llm.generate_with_context(messages).await {
            Ok(response) => response,
            Err(e) => {
                warn!("LLM classification failed, falling back to default: {}", e);
                return None;
            }
        };

        let clean = strip_json_fences(&response.content);
        let reply: ClassificationReply = match serde_json::from_str(clean) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Failed to parse classification reply: {}", e);
                return None;
            }
        };

        match reply.agent.as_str() {
            "literature" => Some(AgentKind::Literature),
            "web_crawling" => Some(AgentKind::WebCrawling),
            "paper_review" => Some(AgentKind::PaperReview),
            "qa" => Some(AgentKind::Qa),
            other => {
                warn!("Classifier returned unknown agent '{}'", other);
                None
            }
        }
    }
}

/// The dispatcher's decision logic: classify the utterance, extract the
/// parameters the selected agent needs, and either dispatch or ask the
/// user for the missing piece. Holds no state beyond the registry it is
/// given.
pub struct IntentRouter {
    registry: Arc<AgentRegistry>,
    classifier: Box<dyn IntentClassifier>,
}

impl IntentRouter {
    /// Router with the deterministic keyword classifier.
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        let classifier = Box::new(KeywordClassifier::new(registry.clone()));
        Self {
            registry,
            classifier,
        }
    }

    pub fn with_classifier(
        registry: Arc<AgentRegistry>,
        classifier: Box<dyn IntentClassifier>,
    ) -> Self {
        Self {
            registry,
            classifier,
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub async fn route(
        &self,
        utterance: &str,
        history: &[ConversationTurn],
    ) -> Result<RouteOutcome> {
        let trimmed = utterance.trim();
        if trimmed.is_empty() {
            return Ok(RouteOutcome::Clarify {
                message: "Please enter a message.".to_string(),
            });
        }

        let kind = self
            .classifier
            .classify(trimmed)
            .await
            .unwrap_or_else(|| self.registry.default_kind());

        // A URL in the current utterance wins; otherwise look back through
        // the conversation so "crawl that site again" keeps working.
        let url = extract_url(trimmed)
            .or_else(|| history.iter().rev().find_map(|turn| extract_url(&turn.text)));

        let params = ExtractedParams {
            query: clean_search_query(trimmed),
            url,
            review_mode: ReviewMode::from_utterance(trimmed),
        };

        debug!("Routed utterance to {:?} (url: {:?})", kind, params.url);

        if kind == AgentKind::WebCrawling && params.url.is_none() {
            return Ok(RouteOutcome::Clarify {
                message: "I need a URL to crawl. Please include a full http:// or https:// link."
                    .to_string(),
            });
        }

        Ok(RouteOutcome::Dispatch { kind, params })
    }
}

/// First URL substring in the text, with trailing punctuation trimmed.
pub fn extract_url(text: &str) -> Option<String> {
    let url_re = Regex::new(r#"https?://[^\s<>"')\]]+"#).unwrap();
    url_re
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']).to_string())
}

/// Strip lead-in phrasing so tools see the topic, not the imperative.
fn clean_search_query(utterance: &str) -> String {
    const LEAD_INS: [&str; 8] = [
        "search for top papers on",
        "search for papers on",
        "find papers on",
        "find papers about",
        "top papers on",
        "papers on",
        "search for",
        "recommend",
    ];

    let lowered = utterance.to_lowercase();
    for lead_in in LEAD_INS {
        if let Some(pos) = lowered.find(lead_in) {
            // Byte offsets can drift between the original and its
            // lowercased form; fall through rather than slice badly.
            let Some(rest) = utterance.get(pos + lead_in.len()..) else {
                continue;
            };
            let rest = rest.trim();
            if !rest.is_empty() {
                return rest.trim_end_matches(['.', '?', '!']).to_string();
            }
        }
    }
    utterance.trim_end_matches(['.', '?', '!']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> IntentRouter {
        IntentRouter::new(Arc::new(AgentRegistry::new()))
    }

    #[tokio::test]
    async fn literature_routing_is_deterministic() {
        let router = router();
        let utterance = "Search for top papers on temporal graph neural networks";

        for _ in 0..3 {
            match router.route(utterance, &[]).await.unwrap() {
                RouteOutcome::Dispatch { kind, params } => {
                    assert_eq!(kind, AgentKind::Literature);
                    assert_eq!(params.query, "temporal graph neural networks");
                }
                other => panic!("expected dispatch, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn unmatched_utterance_falls_back_to_default() {
        let router = router();
        match router.route("hello there", &[]).await.unwrap() {
            RouteOutcome::Dispatch { kind, .. } => assert_eq!(kind, AgentKind::Literature),
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn crawl_utterance_extracts_the_exact_url() {
        let router = router();
        let utterance = "Crawl this website and extract structured data: https://example.com";
        match router.route(utterance, &[]).await.unwrap() {
            RouteOutcome::Dispatch { kind, params } => {
                assert_eq!(kind, AgentKind::WebCrawling);
                assert_eq!(params.url.as_deref(), Some("https://example.com"));
            }
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn crawl_without_url_asks_for_clarification() {
        let router = router();
        match router.route("Please crawl that site", &[]).await.unwrap() {
            RouteOutcome::Clarify { message } => {
                assert!(!message.is_empty());
                assert!(message.to_lowercase().contains("url"));
            }
            other => panic!("expected clarification, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn crawl_url_can_come_from_history() {
        let router = router();
        let history = vec![
            ConversationTurn::new(
                scholar_core::TurnRole::User,
                "Crawl https://example.com/listings please",
            ),
            ConversationTurn::new(scholar_core::TurnRole::Agent, "Done."),
        ];
        match router.route("crawl it again", &history).await.unwrap() {
            RouteOutcome::Dispatch { kind, params } => {
                assert_eq!(kind, AgentKind::WebCrawling);
                assert_eq!(params.url.as_deref(), Some("https://example.com/listings"));
            }
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn qa_utterances_route_to_qa() {
        let router = router();
        match router.route("What is a graph attention layer?", &[]).await.unwrap() {
            RouteOutcome::Dispatch { kind, .. } => assert_eq!(kind, AgentKind::Qa),
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn review_mode_is_extracted() {
        let router = router();
        let utterance = "Give me a rapid review of https://example.com/paper.pdf";
        match router.route(utterance, &[]).await.unwrap() {
            RouteOutcome::Dispatch { kind, params } => {
                assert_eq!(kind, AgentKind::PaperReview);
                assert_eq!(params.review_mode, Some(ReviewMode::Rapid));
                assert_eq!(params.url.as_deref(), Some("https://example.com/paper.pdf"));
            }
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn llm_classifier_reply_selects_the_agent() {
        use anyhow::anyhow;
        use scholar_llm::{LLMResponse, TokenStream};

        struct CannedProvider(&'static str);

        #[async_trait]
        impl LLMProvider for CannedProvider {
            async fn generate(&self, _prompt: &str) -> anyhow::Result<LLMResponse> {
                self.generate_with_context(Vec::new()).await
            }

            async fn generate_with_context(
                &self,
                _messages: Vec<Message>,
            ) -> anyhow::Result<LLMResponse> {
                Ok(LLMResponse {
                    content: self.0.to_string(),
                    finish_reason: None,
                    usage: None,
                })
            }

            async fn stream_generate(
                &self,
                _messages: Vec<Message>,
            ) -> anyhow::Result<TokenStream> {
                Err(anyhow!("not needed"))
            }
        }

        let registry = Arc::new(AgentRegistry::new());

        let classifier = LlmClassifier::new(
            Arc::new(CannedProvider(r#"```json
{"agent": "paper_review"}
```"#)),
            registry.clone(),
        );
        assert_eq!(
            classifier.classify("anything").await,
            Some(AgentKind::PaperReview)
        );

        // Malformed replies degrade to None so the router falls back to
        // the default agent instead of failing the turn.
        let broken = LlmClassifier::new(Arc::new(CannedProvider("not json")), registry);
        assert_eq!(broken.classify("anything").await, None);
    }

    #[test]
    fn url_extraction_trims_trailing_punctuation() {
        assert_eq!(
            extract_url("look at https://example.com/page."),
            Some("https://example.com/page".to_string())
        );
        assert_eq!(extract_url("no link here"), None);
    }

    #[test]
    fn empty_utterance_never_reaches_an_agent() {
        // Clarify outcome checked via route(); the cleaner must also not
        // blow up on odd inputs.
        assert_eq!(clean_search_query("search for"), "search for");
        assert_eq!(clean_search_query("recommend GNN surveys"), "GNN surveys");
    }
}
