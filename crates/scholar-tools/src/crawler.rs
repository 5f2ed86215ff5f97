use crate::{pdf::PdfTool, Tool, ToolInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use scholar_common::ToolResult;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const MAX_CONTENT_CHARS: usize = 5000;

/// Document-level metadata pulled from `<meta>` tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    pub description: String,
    pub keywords: String,
    pub author: String,
}

/// One crawled page: the (URL, content) pair plus extraction context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawledPage {
    pub url: String,
    pub title: String,
    pub content: String,
    pub content_type: String,
    pub metadata: PageMetadata,
    pub links: Vec<String>,
    pub crawl_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub base_url: String,
    pub total_pages_crawled: usize,
    pub max_depth_used: usize,
    pub pages: Vec<CrawledPage>,
}

/// Breadth-first website crawler. Fetches pages with a desktop
/// user-agent, dispatches on content type (HTML, PDF, plain text), and
/// follows in-page links up to a bounded depth and fan-out, with a one
/// second delay between fetches.
pub struct CrawlerTool {
    client: reqwest::Client,
    fetch_delay: Duration,
}

impl CrawlerTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            fetch_delay: Duration::from_secs(1),
        }
    }

    /// Test constructor: no politeness delay.
    pub fn without_delay() -> Self {
        Self {
            client: reqwest::Client::new(),
            fetch_delay: Duration::ZERO,
        }
    }

    pub async fn crawl(
        &self,
        base_url: &str,
        max_depth: usize,
        max_links_per_page: usize,
    ) -> Result<CrawlReport> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: Vec<(String, usize)> = vec![(base_url.to_string(), 0)];
        let mut pages = Vec::new();

        while !queue.is_empty() {
            let (url, depth) = queue.remove(0);

            if visited.contains(&url) || depth > max_depth {
                continue;
            }
            visited.insert(url.clone());

            info!("Crawling: {} (depth: {})", url, depth);

            let page = match self.crawl_single(&url, depth).await {
                Ok(page) => page,
                Err(e) => {
                    if depth == 0 {
                        // Nothing crawled at all: surface the failure.
                        return Err(e);
                    }
                    warn!("Skipping {}: {}", url, e);
                    continue;
                }
            };

            if depth < max_depth && page.content_type == "html" {
                for link in page.links.iter().take(max_links_per_page) {
                    if !visited.contains(link) {
                        queue.push((link.clone(), depth + 1));
                    }
                }
            }

            pages.push(page);

            if !queue.is_empty() && !self.fetch_delay.is_zero() {
                sleep(self.fetch_delay).await;
            }
        }

        Ok(CrawlReport {
            base_url: base_url.to_string(),
            total_pages_crawled: pages.len(),
            max_depth_used: max_depth,
            pages,
        })
    }

    async fn crawl_single(&self, url: &str, depth: usize) -> Result<CrawledPage> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("fetch of {} returned HTTP {}", url, response.status());
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        if content_type.contains("application/pdf") {
            let bytes = response.bytes().await.context("Failed to read PDF body")?;
            let text = PdfTool::extract_text(&bytes)?;
            return Ok(CrawledPage {
                url: url.to_string(),
                title: format!("PDF Document: {}", last_path_segment(url)),
                content: truncate(&text, MAX_CONTENT_CHARS),
                content_type: "pdf".to_string(),
                metadata: PageMetadata::default(),
                links: Vec::new(),
                crawl_depth: depth,
            });
        }

        let body = response.text().await.context("Failed to read response body")?;

        if content_type.contains("text/html") {
            let extraction = extract_html(&body, url);
            debug!(
                "Extracted {} chars and {} links from {}",
                extraction.content.len(),
                extraction.links.len(),
                url
            );
            return Ok(CrawledPage {
                url: url.to_string(),
                title: extraction.title,
                content: truncate(&extraction.content, MAX_CONTENT_CHARS),
                content_type: "html".to_string(),
                metadata: extraction.metadata,
                links: extraction.links,
                crawl_depth: depth,
            });
        }

        Ok(CrawledPage {
            url: url.to_string(),
            title: format!("Document: {}", last_path_segment(url)),
            content: truncate(&body, MAX_CONTENT_CHARS),
            content_type: "text".to_string(),
            metadata: PageMetadata::default(),
            links: Vec::new(),
            crawl_depth: depth,
        })
    }
}

impl Default for CrawlerTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CrawlerTool {
    fn name(&self) -> &'static str {
        "web_crawler"
    }

    fn description(&self) -> &'static str {
        "Crawls a website and extracts content from multiple pages with configurable depth and link limits."
    }

    async fn invoke(&self, input: ToolInput) -> ToolResult {
        let url = match input.get("url") {
            Some(u) if !u.trim().is_empty() => u.trim().to_string(),
            _ => return ToolResult::error("web_crawler needs a 'url' argument"),
        };
        let max_depth = input.get("max_depth").and_then(|n| n.parse().ok()).unwrap_or(1);
        let max_links = input
            .get("max_links_per_page")
            .and_then(|n| n.parse().ok())
            .unwrap_or(5);

        match self.crawl(&url, max_depth, max_links).await {
            Ok(report) => match serde_json::to_string_pretty(&report) {
                Ok(json) => ToolResult::ok(json),
                Err(e) => ToolResult::error(e.to_string()),
            },
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

pub(crate) struct HtmlExtraction {
    pub title: String,
    pub content: String,
    pub links: Vec<String>,
    pub metadata: PageMetadata,
}

/// Extract title, visible text, absolute links, and meta tags from HTML.
pub(crate) fn extract_html(html: &str, base_url: &str) -> HtmlExtraction {
    // Scripts and styles are dropped up front so the text pass only sees
    // rendered content.
    let script_re = Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap();
    let style_re = Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap();
    let scripts_stripped = script_re.replace_all(html, " ");
    let stripped = style_re.replace_all(&scripts_stripped, " ");

    let document = Html::parse_document(&stripped);

    let title_sel = Selector::parse("title").unwrap();
    let title = document
        .select(&title_sel)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let body_sel = Selector::parse("body").unwrap();
    let raw_text = document
        .select(&body_sel)
        .next()
        .map(|body| body.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    let content = raw_text.split_whitespace().collect::<Vec<_>>().join(" ");

    let link_sel = Selector::parse("a[href]").unwrap();
    let base = reqwest::Url::parse(base_url).ok();
    let mut links = Vec::new();
    for anchor in document.select(&link_sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let resolved = match &base {
            Some(base) => base.join(href).map(|u| u.to_string()).ok(),
            None => Some(href.to_string()),
        };
        if let Some(link) = resolved {
            if link.starts_with("http://") || link.starts_with("https://") {
                links.push(link);
            }
        }
    }

    let meta_content = |name: &str| {
        let sel = Selector::parse(&format!(r#"meta[name="{}"]"#, name)).unwrap();
        document
            .select(&sel)
            .next()
            .and_then(|m| m.value().attr("content"))
            .unwrap_or_default()
            .to_string()
    };

    HtmlExtraction {
        title,
        content,
        links,
        metadata: PageMetadata {
            description: meta_content("description"),
            keywords: meta_content("keywords"),
            author: meta_content("author"),
        },
    }
}

fn last_path_segment(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .to_string()
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}
