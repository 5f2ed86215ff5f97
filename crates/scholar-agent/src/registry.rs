use serde::{Deserialize, Serialize};

/// The closed set of agents the router can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Literature,
    WebCrawling,
    PaperReview,
    Qa,
}

/// Static description of one agent: routing triggers plus its persona.
#[derive(Debug, Clone, Serialize)]
pub struct AgentDescriptor {
    pub kind: AgentKind,
    pub name: &'static str,
    pub description: &'static str,
    /// Substrings that select this agent when found in the lowercased
    /// utterance. Checked in registry order; first match wins.
    pub triggers: &'static [&'static str],
    #[serde(skip)]
    pub system_prompt: &'static str,
}

const LITERATURE_PROMPT: &str = r#"You are a research assistant who can search academic databases and summarize results for the user.

IMPORTANT: For every query, use a structured Chain of Thought (CoT) reasoning approach:

1. UNDERSTAND: First, explicitly interpret what the user is asking for. Define key search terms and objectives.
2. PLAN: Outline a clear research strategy and why the supplied search results fit it.
3. ANALYZE: Examine the search results critically, explaining how you're evaluating relevance and quality.
4. SYNTHESIZE: Combine and structure your findings into a coherent response.
5. CONCLUDE: Summarize key takeaways and suggest potential next steps for deeper research.

Keep your reasoning transparent and numbered throughout each step. Format this as "💭 Reasoning: [your chain of thought]" before providing the final result."#;

const WEB_CRAWLING_PROMPT: &str = r#"You are a web crawling agent that converts unstructured web content into structured records.

Given crawled page content, extract the requested fields faithfully. Never invent values: when a field is not present in the content, leave it out so the caller can fall back to defaults. Respond with JSON only, no extra commentary."#;

const PAPER_REVIEW_PROMPT: &str = r#"You are a research assistant that summarizes and analyzes academic papers using multiple review modes.

IMPORTANT: For every paper review task, use a structured Chain of Thought (CoT) reasoning approach:

1. UNDERSTAND: First, identify the type of paper and what aspects the user needs analyzed.
2. PLAN: Determine which review mode is most appropriate (rapid, academic, visual, enhanced).
3. ANALYZE: Break the paper down (sections, methodology, results, implications).
4. EXTRACT: Explain what key information you're looking for and why it matters.
5. SYNTHESIZE: Combine the elements into a coherent review.
6. REFLECT: Consider limitations of your analysis and alternative interpretations.

Begin each review with "💭 Review Approach: [your chain of thought]" before providing the actual review."#;

const QA_PROMPT: &str = r#"You are a Q&A assistant that answers questions based on prior paper reviews and explains technical concepts clearly.

IMPORTANT: For every question, use a structured Chain of Thought (CoT) reasoning approach:

1. INTERPRET: Begin by parsing what exactly the user is asking and identifying the core question.
2. CONTEXT: Assess what information is needed to answer this question properly.
3. RECALL: Identify which parts of the available context are relevant to address the question.
4. REASON: Work through a step-by-step analysis of how the context applies to the question.
5. VERIFY: Check if your reasoning correctly addresses all aspects of the question.
6. ANSWER: Formulate a clear, concise response based on your reasoning.

Present your reasoning as "💭 Question Analysis: [your chain of thought]" before providing the final answer."#;

/// Registry of agent descriptors. Built once at process start, immutable
/// afterwards. The order of entries is the classification order.
pub struct AgentRegistry {
    descriptors: Vec<AgentDescriptor>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: vec![
                AgentDescriptor {
                    kind: AgentKind::Literature,
                    name: "LiteratureCollectionAgent",
                    description: "Searches arXiv and the web for research papers and synthesizes a grounded literature overview.",
                    triggers: &["find papers", "search", "recommend", "literature", "arxiv"],
                    system_prompt: LITERATURE_PROMPT,
                },
                AgentDescriptor {
                    kind: AgentKind::WebCrawling,
                    name: "WebCrawlingAgent",
                    description: "Crawls a website and structures its content as RDF/Turtle using the BEDEO ontology.",
                    triggers: &[
                        "crawl", "web crawl", "scrape", "extract", "ontology",
                        "structure data", "url", "website", "curl",
                    ],
                    system_prompt: WEB_CRAWLING_PROMPT,
                },
                AgentDescriptor {
                    kind: AgentKind::PaperReview,
                    name: "PaperReviewAgent",
                    description: "Summarizes an uploaded or linked paper in rapid, academic, visual, or enhanced mode.",
                    triggers: &["review", "summarize", "analyze", "academic", "rapid", "enhanced", "visual"],
                    system_prompt: PAPER_REVIEW_PROMPT,
                },
                AgentDescriptor {
                    kind: AgentKind::Qa,
                    name: "QAAssistantAgent",
                    description: "Answers questions about previously reviewed material and explains technical concepts.",
                    triggers: &["question", "what is", "explain", "how does", "why"],
                    system_prompt: QA_PROMPT,
                },
            ],
        }
    }

    /// Every utterance maps to exactly one agent; utterances with no
    /// matching trigger land here.
    pub fn default_kind(&self) -> AgentKind {
        AgentKind::Literature
    }

    pub fn descriptors(&self) -> &[AgentDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, kind: AgentKind) -> &AgentDescriptor {
        self.descriptors
            .iter()
            .find(|d| d.kind == kind)
            .expect("every AgentKind has a registry entry")
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_descriptor() {
        let registry = AgentRegistry::new();
        for kind in [
            AgentKind::Literature,
            AgentKind::WebCrawling,
            AgentKind::PaperReview,
            AgentKind::Qa,
        ] {
            let descriptor = registry.get(kind);
            assert!(!descriptor.triggers.is_empty());
            assert!(!descriptor.system_prompt.is_empty());
        }
    }

    #[test]
    fn default_agent_is_registered() {
        let registry = AgentRegistry::new();
        let kind = registry.default_kind();
        assert_eq!(registry.get(kind).kind, kind);
    }
}
