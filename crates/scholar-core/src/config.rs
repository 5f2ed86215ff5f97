use scholar_common::{Result, ScholarError};

/// Which hosted completion service to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    /// Azure OpenAI deployment endpoint.
    Azure,
    /// GitHub Models inference endpoint (shared OpenAI-style API).
    Github,
}

/// Connection settings for the completion service.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub backend: LlmBackend,
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub api_version: String,
    pub temperature: f32,
}

/// Process-wide configuration, read from the environment exactly once at
/// startup and passed by reference afterwards. Never mutated after init.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmSettings,
    /// Path to the Turtle ontology file used by the crawler agent.
    pub ontology_path: String,
    pub bind_addr: String,
}

const DEFAULT_GITHUB_ENDPOINT: &str = "https://models.inference.ai.azure.com";
const DEFAULT_API_VERSION: &str = "2024-05-13";

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let backend = match std::env::var("SCHOLAR_LLM_BACKEND").as_deref() {
            Ok("github") => LlmBackend::Github,
            Ok("azure") | Err(_) => LlmBackend::Azure,
            Ok(other) => {
                return Err(ScholarError::Config(format!(
                    "unknown SCHOLAR_LLM_BACKEND '{}' (expected 'azure' or 'github')",
                    other
                )))
            }
        };

        let api_key = std::env::var("SCHOLAR_LLM_API_KEY")
            .map_err(|_| ScholarError::Config("SCHOLAR_LLM_API_KEY not set".to_string()))?;

        let endpoint = match std::env::var("SCHOLAR_LLM_ENDPOINT") {
            Ok(e) => e,
            Err(_) if backend == LlmBackend::Github => DEFAULT_GITHUB_ENDPOINT.to_string(),
            Err(_) => {
                return Err(ScholarError::Config(
                    "SCHOLAR_LLM_ENDPOINT not set (required for the azure backend)".to_string(),
                ))
            }
        };

        let model =
            std::env::var("SCHOLAR_LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let api_version = std::env::var("SCHOLAR_LLM_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());
        let temperature = std::env::var("SCHOLAR_LLM_TEMPERATURE")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0.7);

        let ontology_path = std::env::var("SCHOLAR_ONTOLOGY_PATH")
            .unwrap_or_else(|_| "ontology/bedeo.ttl".to_string());
        let bind_addr =
            std::env::var("SCHOLAR_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8750".to_string());

        Ok(Self {
            llm: LlmSettings {
                backend,
                api_key,
                endpoint,
                model,
                api_version,
                temperature,
            },
            ontology_path,
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults() {
        let settings = LlmSettings {
            backend: LlmBackend::Github,
            api_key: "token".to_string(),
            endpoint: DEFAULT_GITHUB_ENDPOINT.to_string(),
            model: "gpt-4o".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            temperature: 0.7,
        };
        assert_eq!(settings.backend, LlmBackend::Github);
        assert!(settings.endpoint.starts_with("https://"));
    }
}
