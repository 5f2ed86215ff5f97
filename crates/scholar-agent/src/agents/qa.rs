use super::{single_chunk, Agent, AgentRequest};
use crate::registry::{AgentKind, AgentRegistry};
use async_trait::async_trait;
use scholar_common::{Result, ScholarError};
use scholar_core::{Session, TurnRole};
use scholar_llm::{LLMProvider, Message, TokenStream};
use std::sync::Arc;
use tracing::warn;

const CONTEXT_TURNS: usize = 6;
const REVIEW_CONTEXT_CHARS: usize = 4000;

/// Answers questions from session context (history and the last review)
/// and explains technical concepts. Pure LLM, no tools.
pub struct QaAgent {
    llm: Arc<dyn LLMProvider>,
    system_prompt: &'static str,
}

impl QaAgent {
    pub fn new(llm: Arc<dyn LLMProvider>, registry: &AgentRegistry) -> Self {
        Self {
            llm,
            system_prompt: registry.get(AgentKind::Qa).system_prompt,
        }
    }

    fn context_block(session: &Session) -> String {
        let mut context = String::new();

        if let Some(review) = &session.last_review {
            let excerpt: String = review.chars().take(REVIEW_CONTEXT_CHARS).collect();
            context.push_str("Most recent document review:\n");
            context.push_str(&excerpt);
            context.push_str("\n\n");
        }

        let recent = session.recent_turns(CONTEXT_TURNS);
        if !recent.is_empty() {
            context.push_str("Recent conversation:\n");
            for turn in recent {
                let who = match turn.role {
                    TurnRole::User => "user",
                    TurnRole::Agent => "assistant",
                };
                context.push_str(&format!("{}: {}\n", who, turn.text));
            }
        }

        if context.is_empty() {
            context.push_str("(no prior context in this session)");
        }

        context
    }
}

#[async_trait]
impl Agent for QaAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Qa
    }

    async fn handle(
        &self,
        request: &AgentRequest,
        session: &mut Session,
    ) -> Result<TokenStream> {
        let messages = vec![
            Message::system(self.system_prompt),
            Message::user(format!(
                "Context from this session:\n{}\n\nQuestion: {}",
                Self::context_block(session),
                request.utterance
            )),
        ];

        match self.llm.stream_generate(messages.clone()).await {
            Ok(tokens) => Ok(tokens),
            Err(stream_err) => {
                // Some backends only support plain completions.
                warn!("Streaming unavailable, using plain completion: {}", stream_err);
                match self.llm.generate_with_context(messages).await {
                    Ok(response) => Ok(single_chunk(response.content)),
                    Err(e) => Err(ScholarError::Llm(e.to_string())),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::ExtractedParams;
    use anyhow::anyhow;
    use futures::StreamExt;
    use scholar_llm::LLMResponse;

    struct ScriptedProvider {
        streamed: bool,
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<LLMResponse> {
            self.generate_with_context(Vec::new()).await
        }

        async fn generate_with_context(
            &self,
            _messages: Vec<Message>,
        ) -> anyhow::Result<LLMResponse> {
            Ok(LLMResponse {
                content: "plain answer".to_string(),
                finish_reason: None,
                usage: None,
            })
        }

        async fn stream_generate(&self, _messages: Vec<Message>) -> anyhow::Result<TokenStream> {
            if self.streamed {
                Ok(Box::pin(futures::stream::iter(vec![
                    Ok("streamed ".to_string()),
                    Ok("answer".to_string()),
                ])))
            } else {
                Err(anyhow!("streaming unsupported"))
            }
        }
    }

    fn request(text: &str) -> AgentRequest {
        AgentRequest {
            utterance: text.to_string(),
            params: ExtractedParams {
                query: text.to_string(),
                url: None,
                review_mode: None,
            },
        }
    }

    async fn collect(mut stream: TokenStream) -> String {
        let mut out = String::new();
        while let Some(item) = stream.next().await {
            out.push_str(&item.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn streams_when_the_provider_supports_it() {
        let registry = AgentRegistry::new();
        let agent = QaAgent::new(Arc::new(ScriptedProvider { streamed: true }), &registry);
        let mut session = Session::new();

        let stream = agent
            .handle(&request("What is attention?"), &mut session)
            .await
            .unwrap();
        assert_eq!(collect(stream).await, "streamed answer");
    }

    #[tokio::test]
    async fn degrades_to_plain_completion_without_streaming() {
        let registry = AgentRegistry::new();
        let agent = QaAgent::new(Arc::new(ScriptedProvider { streamed: false }), &registry);
        let mut session = Session::new();

        let stream = agent
            .handle(&request("What is attention?"), &mut session)
            .await
            .unwrap();
        assert_eq!(collect(stream).await, "plain answer");
    }

    #[test]
    fn context_block_includes_review_and_turns() {
        let mut session = Session::new();
        session.last_review = Some("The paper proposes a new encoder.".to_string());
        session.push_turn(TurnRole::User, "review this paper");
        session.push_turn(TurnRole::Agent, "Done.");

        let block = QaAgent::context_block(&session);
        assert!(block.contains("new encoder"));
        assert!(block.contains("user: review this paper"));
    }
}
