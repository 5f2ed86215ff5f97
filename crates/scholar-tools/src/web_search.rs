use crate::{Tool, ToolInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use scholar_common::ToolResult;
use tracing::debug;

/// Searches the web via the DuckDuckGo Instant Answer API (keyless JSON).
pub struct WebSearchTool {
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub async fn search(&self, query: &str) -> Result<String> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_redirect=1&no_html=1",
            urlencoding::encode(query)
        );

        debug!("Web search: {}", query);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach the DuckDuckGo API")?;

        if !response.status().is_success() {
            anyhow::bail!("DuckDuckGo API returned HTTP {}", response.status());
        }

        let json: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse DuckDuckGo response")?;

        Ok(parse_instant_answer(&json))
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "Searches the web for relevant academic content."
    }

    async fn invoke(&self, input: ToolInput) -> ToolResult {
        let query = match input.get("query") {
            Some(q) if !q.trim().is_empty() => q.trim().to_string(),
            _ => return ToolResult::error("empty query for web_search"),
        };

        match self.search(&query).await {
            Ok(text) => ToolResult::ok(text),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// Prefer the abstract; fall back to the first three related topics.
pub fn parse_instant_answer(json: &serde_json::Value) -> String {
    let abstract_text = json["AbstractText"].as_str().unwrap_or("");
    let heading = json["Heading"].as_str().unwrap_or("");

    let mut result_text = String::new();
    if !heading.is_empty() {
        result_text.push_str(&format!("{}\n", heading));
    }
    if !abstract_text.is_empty() {
        result_text.push_str(abstract_text);
    } else if let Some(topics) = json["RelatedTopics"].as_array() {
        for (idx, item) in topics.iter().take(3).enumerate() {
            if let Some(text) = item["Text"].as_str() {
                result_text.push_str(&format!("{}. {}\n", idx + 1, text));
            }
            if let Some(href) = item["FirstURL"].as_str() {
                result_text.push_str(&format!("   {}\n", href));
            }
        }
    }

    if result_text.is_empty() {
        result_text = "No web results found.".to_string();
    }

    result_text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn abstract_wins_over_related_topics() {
        let payload = json!({
            "Heading": "Graph neural network",
            "AbstractText": "A graph neural network is a class of neural networks.",
            "RelatedTopics": [{"Text": "ignored"}]
        });
        let text = parse_instant_answer(&payload);
        assert!(text.starts_with("Graph neural network\n"));
        assert!(text.contains("class of neural networks"));
        assert!(!text.contains("ignored"));
    }

    #[test]
    fn falls_back_to_top_three_topics() {
        let payload = json!({
            "AbstractText": "",
            "RelatedTopics": [
                {"Text": "first", "FirstURL": "https://a.example"},
                {"Text": "second"},
                {"Text": "third"},
                {"Text": "fourth"}
            ]
        });
        let text = parse_instant_answer(&payload);
        assert!(text.contains("1. first"));
        assert!(text.contains("3. third"));
        assert!(!text.contains("fourth"));
    }

    #[test]
    fn empty_payload_yields_message() {
        assert_eq!(parse_instant_answer(&json!({})), "No web results found.");
    }
}
