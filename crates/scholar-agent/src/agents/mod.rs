mod crawler;
mod literature;
mod qa;
mod review;

pub use crawler::CrawlerAgent;
pub use literature::LiteratureAgent;
pub use qa::QaAgent;
pub use review::{ReviewAgent, ReviewMode};

use crate::registry::AgentKind;
use crate::router::ExtractedParams;
use async_trait::async_trait;
use scholar_core::Session;
use scholar_llm::TokenStream;

/// One routed user request, as handed to the selected agent.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub utterance: String,
    pub params: ExtractedParams,
}

/// Uniform agent shape: consume one request, update session scratch
/// state, and produce a reply stream. Agents invoke their tool wrappers
/// synchronously 0..N times and fold the tool payloads into the LLM
/// prompt; they never coordinate with each other directly.
#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> AgentKind;

    async fn handle(
        &self,
        request: &AgentRequest,
        session: &mut Session,
    ) -> scholar_common::Result<TokenStream>;
}

/// Single-chunk reply for agents whose output is computed up front.
pub(crate) fn single_chunk(text: String) -> TokenStream {
    Box::pin(futures::stream::once(async move { Ok(text) }))
}
