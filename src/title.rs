//! Title Assist: ask an OpenAI-compatible completion endpoint for a title.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::settings::AiConfig;

/// Content beyond this many characters is cut before it reaches the prompt.
const MAX_PROMPT_CONTENT: usize = 1000;
const MAX_TITLE_LEN: usize = 100;

#[derive(Clone)]
pub struct TitleAssist {
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<Value>,
}

impl TitleAssist {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Ask the configured endpoint for a title for `content`.
    pub async fn suggest_title(&self, content: &str, config: &AiConfig) -> ApiResult<String> {
        if !config.enabled || config.api_key.is_empty() {
            return Err(ApiError::FeatureDisabled("Title Assist"));
        }

        let prompt = render_prompt(&config.prompt, content);
        let request = ChatRequest {
            model: &config.model,
            messages: [ChatMessage {
                role: "user",
                content: &prompt,
            }],
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        let response: ChatResponse = self
            .client
            .post(endpoint(&config.base_url, "chat/completions"))
            .bearer_auth(&config.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .and_then(|raw| clean_title(&raw))
            .ok_or_else(|| ApiError::UpstreamUnavailable("empty completion".to_owned()))
    }

    /// List the models offered by the configured endpoint.
    pub async fn list_models(&self, config: &AiConfig) -> ApiResult<Vec<Value>> {
        if config.base_url.is_empty() || config.api_key.is_empty() {
            return Err(ApiError::UpstreamUnavailable(
                "AI configuration not complete".to_owned(),
            ));
        }

        let response: ModelsResponse = self
            .client
            .get(endpoint(&config.base_url, "models"))
            .bearer_auth(&config.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.data)
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

/// Substitute the (possibly truncated) content into the prompt template.
pub fn render_prompt(template: &str, content: &str) -> String {
    let content = match content.char_indices().nth(MAX_PROMPT_CONTENT) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_owned(),
    };
    template.replace("{content}", &content)
}

/// Normalize a raw completion into a title, if anything is left of it.
pub fn clean_title(raw: &str) -> Option<String> {
    let title: String = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .chars()
        .take(MAX_TITLE_LEN)
        .collect();

    (!title.is_empty()).then_some(title)
}
