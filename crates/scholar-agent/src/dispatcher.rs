use crate::agents::{Agent, AgentRequest, CrawlerAgent, LiteratureAgent, QaAgent, ReviewAgent};
use crate::registry::{AgentKind, AgentRegistry};
use crate::router::{IntentRouter, RouteOutcome};
use futures::{Stream, StreamExt};
use scholar_common::ScholarError;
use scholar_core::{Session, TurnRole};
use scholar_llm::LLMProvider;
use scholar_tools::OntologyTool;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{info, warn};

/// Reply delivered to the chat boundary. Errors have already been
/// converted to user-facing text, so consumers just forward fragments.
pub type ReplyStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Composes the router and the closed set of agents. This is the only
/// place agents are selected, and the boundary where every failure is
/// converted into a user-visible message.
pub struct AgentDispatcher {
    registry: Arc<AgentRegistry>,
    router: IntentRouter,
    literature: LiteratureAgent,
    crawler: CrawlerAgent,
    review: ReviewAgent,
    qa: QaAgent,
}

impl AgentDispatcher {
    pub fn new(llm: Arc<dyn LLMProvider>, ontology: OntologyTool) -> Self {
        let registry = Arc::new(AgentRegistry::new());
        Self {
            router: IntentRouter::new(registry.clone()),
            literature: LiteratureAgent::new(llm.clone(), &registry),
            crawler: CrawlerAgent::new(llm.clone(), ontology, &registry),
            review: ReviewAgent::new(llm.clone(), &registry),
            qa: QaAgent::new(llm, &registry),
            registry,
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Route one utterance and stream the selected agent's reply.
    ///
    /// The user turn is appended to the session here; the caller appends
    /// the agent turn once it has drained the stream.
    pub async fn dispatch_stream(&self, utterance: &str, session: &mut Session) -> ReplyStream {
        session.push_turn(TurnRole::User, utterance);

        let outcome = match self.router.route(utterance, &session.turns).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Routing failed: {}", e);
                return single(e.user_message());
            }
        };

        let (kind, params) = match outcome {
            RouteOutcome::Clarify { message } => return single(message),
            RouteOutcome::Dispatch { kind, params } => (kind, params),
        };

        info!("Dispatching to {}", self.registry.get(kind).name);

        let request = AgentRequest {
            utterance: utterance.to_string(),
            params,
        };

        let result = match kind {
            AgentKind::Literature => self.literature.handle(&request, session).await,
            AgentKind::WebCrawling => self.crawler.handle(&request, session).await,
            AgentKind::PaperReview => self.review.handle(&request, session).await,
            AgentKind::Qa => self.qa.handle(&request, session).await,
        };

        match result {
            Ok(tokens) => Box::pin(tokens.map(|item| match item {
                Ok(fragment) => fragment,
                Err(e) => {
                    warn!("Mid-stream failure: {}", e);
                    format!("\n\n⚠️ {}", ScholarError::Llm(e.to_string()).user_message())
                }
            })),
            Err(e) => {
                warn!("Agent failed at the dispatch boundary: {}", e);
                single(e.user_message())
            }
        }
    }
}

fn single(text: String) -> ReplyStream {
    Box::pin(futures::stream::once(async move { text }))
}
