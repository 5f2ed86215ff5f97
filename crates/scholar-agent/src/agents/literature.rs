use super::{single_chunk, Agent, AgentRequest};
use crate::registry::{AgentKind, AgentRegistry};
use async_trait::async_trait;
use futures::StreamExt;
use scholar_common::Result;
use scholar_core::Session;
use scholar_llm::{LLMProvider, Message, TokenStream};
use scholar_tools::{ArxivTool, Tool, ToolInput, WebSearchTool};
use std::sync::Arc;
use tracing::{info, warn};

/// Default agent: searches arXiv (and the web when arXiv comes up empty),
/// then streams an LLM synthesis grounded in the ranked results.
pub struct LiteratureAgent {
    llm: Arc<dyn LLMProvider>,
    arxiv: ArxivTool,
    web: WebSearchTool,
    system_prompt: &'static str,
}

impl LiteratureAgent {
    pub fn new(llm: Arc<dyn LLMProvider>, registry: &AgentRegistry) -> Self {
        Self {
            llm,
            arxiv: ArxivTool::new(),
            web: WebSearchTool::new(),
            system_prompt: registry.get(AgentKind::Literature).system_prompt,
        }
    }
}

#[async_trait]
impl Agent for LiteratureAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Literature
    }

    async fn handle(
        &self,
        request: &AgentRequest,
        _session: &mut Session,
    ) -> Result<TokenStream> {
        let query = request.params.query.clone();

        let ranked = self
            .arxiv
            .invoke(ToolInput::new().with("query", &query).with("max_results", "5"))
            .await
            .into_payload()?;

        // When arXiv has nothing, pull general web context so the answer
        // is still grounded in something.
        let mut grounding = format!("arxiv_search results:\n{}", ranked);
        if !ranked.contains("1. **") {
            info!("arXiv returned no papers for '{}', trying web search", query);
            let web = self.web.invoke(ToolInput::new().with("query", &query)).await;
            if web.is_ok() {
                grounding.push_str(&format!("\n\nweb_search results:\n{}", web.payload));
            } else {
                warn!("web_search fallback failed: {:?}", web.detail);
            }
        }

        let messages = vec![
            Message::system(self.system_prompt),
            Message::user(format!(
                "{}\n\nSearch results gathered for you:\n{}\n\nGround your answer in these results and cite papers by title.",
                request.utterance, grounding
            )),
        ];

        let header = format!("🔍 **Top results for \"{}\"**\n\n{}\n---\n\n", query, ranked);

        match self.llm.stream_generate(messages).await {
            Ok(tokens) => {
                let opening = futures::stream::once(async move { Ok(header) });
                Ok(Box::pin(opening.chain(tokens)))
            }
            Err(e) => {
                // The ranked list is still worth showing when the model is
                // unavailable.
                warn!("LLM synthesis unavailable: {}", e);
                Ok(single_chunk(format!(
                    "{}_The language model could not summarize these results: {}_",
                    header, e
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::ExtractedParams;
    use anyhow::anyhow;
    use scholar_llm::LLMResponse;

    struct FailingProvider;

    #[async_trait]
    impl LLMProvider for FailingProvider {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<LLMResponse> {
            Err(anyhow!("simulated outage"))
        }

        async fn generate_with_context(
            &self,
            _messages: Vec<Message>,
        ) -> anyhow::Result<LLMResponse> {
            Err(anyhow!("simulated outage"))
        }

        async fn stream_generate(&self, _messages: Vec<Message>) -> anyhow::Result<TokenStream> {
            Err(anyhow!("simulated outage"))
        }
    }

    #[tokio::test]
    #[ignore] // Hits the live arXiv API
    async fn ranked_list_survives_llm_outage() {
        let registry = AgentRegistry::new();
        let agent = LiteratureAgent::new(Arc::new(FailingProvider), &registry);
        let request = AgentRequest {
            utterance: "Search for top papers on temporal graph neural networks".to_string(),
            params: ExtractedParams {
                query: "temporal graph neural networks".to_string(),
                url: None,
                review_mode: None,
            },
        };

        let mut session = Session::new();
        let mut stream = agent.handle(&request, &mut session).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert!(first.contains("Top results"));
    }
}
