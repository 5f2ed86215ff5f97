mod agents;
mod dispatcher;
mod registry;
mod router;

pub use agents::{
    Agent, AgentRequest, CrawlerAgent, LiteratureAgent, QaAgent, ReviewAgent, ReviewMode,
};
pub use dispatcher::{AgentDispatcher, ReplyStream};
pub use registry::{AgentDescriptor, AgentKind, AgentRegistry};
pub use router::{
    extract_url, ExtractedParams, IntentClassifier, IntentRouter, KeywordClassifier,
    LlmClassifier, RouteOutcome,
};
