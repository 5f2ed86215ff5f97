use crate::{Tool, ToolInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use scholar_common::ToolResult;
use tracing::debug;

/// Extracts text from PDF documents, fetched over HTTP or read from a
/// local path.
pub struct PdfTool {
    client: reqwest::Client,
}

impl PdfTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Extract text from in-memory PDF bytes.
    pub fn extract_text(bytes: &[u8]) -> Result<String> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .context("Failed to extract text from PDF")?;
        Ok(text.trim().to_string())
    }

    pub async fn fetch_and_extract(&self, url: &str) -> Result<String> {
        debug!("Fetching PDF: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch PDF from {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("PDF fetch returned HTTP {}", response.status());
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read PDF response body")?;

        Self::extract_text(&bytes)
    }

    pub fn extract_from_path(path: &str) -> Result<String> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read PDF at {}", path))?;
        Self::extract_text(&bytes)
    }
}

impl Default for PdfTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for PdfTool {
    fn name(&self) -> &'static str {
        "pdf_extract"
    }

    fn description(&self) -> &'static str {
        "Extracts plain text from a PDF given a URL or local path."
    }

    async fn invoke(&self, input: ToolInput) -> ToolResult {
        let outcome = if let Some(url) = input.get("url") {
            self.fetch_and_extract(url).await
        } else if let Some(path) = input.get("path") {
            Self::extract_from_path(path)
        } else {
            return ToolResult::error("pdf_extract needs a 'url' or 'path' argument");
        };

        match outcome {
            Ok(text) if text.is_empty() => {
                ToolResult::error("the PDF contained no extractable text")
            }
            Ok(text) => ToolResult::ok(text),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invoke_without_arguments_is_an_error() {
        let tool = PdfTool::new();
        let result = tool.invoke(ToolInput::new()).await;
        assert!(!result.is_ok());
        assert!(result.detail.unwrap().contains("url"));
    }

    #[tokio::test]
    async fn missing_local_file_maps_to_error_result() {
        let tool = PdfTool::new();
        let result = tool
            .invoke(ToolInput::new().with("path", "/nonexistent/paper.pdf"))
            .await;
        assert!(!result.is_ok());
    }
}
