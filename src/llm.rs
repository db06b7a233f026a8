use log::{info, warn};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default text-generation endpoint
pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-Goog-Api-Key";

/// Prefix of every completion that stands in for a failed request
pub const ERROR_MARKER: &str = "❌ Gemini Error:";

/// Longest slice of an error response body quoted back to the user
const MAX_ERROR_BODY: usize = 500;

/// API key that never shows up in `Debug` output or logs
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a key read from configuration
    pub fn new(key: impl Into<String>) -> Self {
        ApiKey(key.into())
    }

    /// The key itself, for the request header only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}

/// Connection settings for the text-generation endpoint
#[derive(Clone, Debug)]
pub struct LlmConfig {
    /// Full `generateContent` URL requests are posted to
    pub endpoint: String,
    /// Sent as the [`API_KEY_HEADER`] header
    pub api_key: ApiKey,
    /// Overrides the HTTP client's default request timeout when set
    pub timeout: Option<Duration>,
}

impl LlmConfig {
    /// Settings for [`DEFAULT_ENDPOINT`] with the client's default timeout
    ///
    /// # Arguments
    /// * `api_key` - Key for the endpoint
    ///
    /// # Returns
    /// * `LlmConfig` - Config ready to hand to [`GeminiClient::new`]
    pub fn new(api_key: ApiKey) -> Self {
        LlmConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key,
            timeout: None,
        }
    }
}

/// Why a completion request produced no text
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection, timeout, or a body that could not be read as JSON
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx status; `body` is the start of the response text
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// JSON that does not have the response shape
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Well-formed response without any generated text
    #[error("response has no candidates[0].content.parts[0].text")]
    MissingText,
}

/// Request body: `{"contents":[{"parts":[{"text": prompt}]}]}`
#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    /// Always a single content entry
    pub contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
pub struct RequestContent<'a> {
    /// Always a single text part
    pub parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
pub struct RequestPart<'a> {
    /// The prompt
    pub text: &'a str,
}

impl<'a> GenerateRequest<'a> {
    /// Wraps a prompt in the request envelope
    pub fn new(prompt: &'a str) -> Self {
        GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        }
    }
}

/// Expected success body; every level is optional so a missing path decodes
/// cleanly and is reported as [`LlmError::MissingText`]
#[derive(Debug, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

/// Result of one completion request
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    /// The completion, or an [`ERROR_MARKER`]-prefixed description of the failure
    pub text: String,
    /// Pretty-printed response body, when one was received and decoded as JSON
    pub raw_response: Option<String>,
}

impl Completion {
    /// A successful completion with no raw body attached
    pub fn text(text: impl Into<String>) -> Self {
        Completion {
            text: text.into(),
            raw_response: None,
        }
    }

    /// A failed completion carrying the error marker
    pub fn failed(error: &LlmError, raw_response: Option<String>) -> Self {
        Completion {
            text: format!("{} {}", ERROR_MARKER, error),
            raw_response,
        }
    }

    /// True when the text stands in for a failed request
    pub fn is_error(&self) -> bool {
        self.text.starts_with(ERROR_MARKER)
    }
}

/// Anything that turns a prompt into a completion
///
/// Implementations must not panic or return errors: a failure is expressed as
/// an [`ERROR_MARKER`]-prefixed completion so it flows through the pipeline
/// like any other text.
pub trait TextGenerator: Send + Sync {
    /// Sends one prompt and waits for its completion
    fn complete(&self, prompt: &str) -> Completion;
}

/// Blocking client for the Gemini `generateContent` REST endpoint
///
/// The HTTP client is created per request. It spins up its own runtime
/// internally, so this type must only be used from a thread that may block.
pub struct GeminiClient {
    config: LlmConfig,
}

impl GeminiClient {
    /// Creates a client for the given endpoint settings
    ///
    /// No connection is made until [`TextGenerator::complete`] is called.
    ///
    /// # Arguments
    /// * `config` - Endpoint, API key and timeout
    ///
    /// # Returns
    /// * `GeminiClient` - Client ready to issue completions
    pub fn new(config: LlmConfig) -> Self {
        GeminiClient { config }
    }

    fn http_client(&self) -> Result<Client, LlmError> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }

    /// Sends the prompt and returns the decoded JSON body of a 2xx response
    fn send(&self, prompt: &str) -> Result<serde_json::Value, LlmError> {
        let response = self
            .http_client()?
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, self.config.api_key.expose())
            .json(&GenerateRequest::new(prompt))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text() {
                Ok(text) => text.chars().take(MAX_ERROR_BODY).collect(),
                Err(e) => {
                    warn!("Could not read the body of a {} response: {}", status, e);
                    String::new()
                }
            };
            return Err(LlmError::Status { status, body });
        }

        Ok(response.json()?)
    }
}

impl TextGenerator for GeminiClient {
    fn complete(&self, prompt: &str) -> Completion {
        info!(
            "Requesting completion from {} ({} prompt chars)",
            self.config.endpoint,
            prompt.chars().count()
        );

        let body = match self.send(prompt) {
            Ok(body) => body,
            Err(e) => {
                warn!("Completion request failed: {}", e);
                return Completion::failed(&e, None);
            }
        };

        let raw_response = serde_json::to_string_pretty(&body).ok();
        let extracted = serde_json::from_value::<GenerateResponse>(body)
            .map_err(LlmError::from)
            .and_then(|parsed| {
                parsed
                    .first_text()
                    .map(str::to_string)
                    .ok_or(LlmError::MissingText)
            });

        match extracted {
            Ok(text) => {
                info!("Received completion ({} chars)", text.chars().count());
                Completion {
                    text,
                    raw_response,
                }
            }
            Err(e) => {
                warn!("Completion response unusable: {}", e);
                Completion::failed(&e, raw_response)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATE_PATH: &str = "/v1beta/models/test:generateContent";

    fn client_for(endpoint: String) -> GeminiClient {
        GeminiClient::new(LlmConfig {
            endpoint,
            api_key: ApiKey::new("test-key"),
            timeout: Some(Duration::from_secs(10)),
        })
    }

    fn endpoint_of(server: &MockServer) -> String {
        format!("{}{}", server.uri(), GENERATE_PATH)
    }

    /// The blocking client must not run on an async worker thread
    async fn complete_blocking(client: GeminiClient, prompt: &str) -> Completion {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || client.complete(&prompt))
            .await
            .unwrap()
    }

    #[test]
    fn request_body_has_expected_shape() {
        let json = serde_json::to_value(GenerateRequest::new("hello")).unwrap();
        assert_eq!(json, json!({ "contents": [{ "parts": [{ "text": "hello" }] }] }));
    }

    #[test]
    fn extracts_first_candidate_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"first"},{"text":"second"}]}},
                       {"content":{"parts":[{"text":"other"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.first_text(), Some("first"));
    }

    #[test]
    fn missing_path_is_none() {
        for body in [
            r#"{}"#,
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{"finishReason":"SAFETY"}]}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"inlineData":{}}]}}]}"#,
        ] {
            let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
            assert_eq!(parsed.first_text(), None, "body {}", body);
        }
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let config = LlmConfig::new(ApiKey::new("super-secret"));
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn posts_prompt_with_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header(API_KEY_HEADER, "test-key"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({ "contents": [{ "parts": [{ "text": "What now?" }] }] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "1. Sell more" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let completion = complete_blocking(client_for(endpoint_of(&server)), "What now?").await;

        assert_eq!(completion.text, "1. Sell more");
        assert!(!completion.is_error());
        assert!(completion.raw_response.unwrap().contains("\"candidates\""));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn http_error_becomes_marked_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({ "error": { "message": "API key not valid" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let completion = complete_blocking(client_for(endpoint_of(&server)), "hi").await;

        assert!(completion.is_error());
        assert!(completion.text.starts_with(ERROR_MARKER));
        assert!(completion.text.contains("403"));
        assert!(completion.text.contains("API key not valid"));
        assert_eq!(completion.raw_response, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn long_error_body_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(2000)))
            .mount(&server)
            .await;

        let completion = complete_blocking(client_for(endpoint_of(&server)), "hi").await;

        assert!(completion.is_error());
        assert!(completion.text.contains(&"x".repeat(MAX_ERROR_BODY)));
        assert!(!completion.text.contains(&"x".repeat(MAX_ERROR_BODY + 1)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_text_keeps_raw_echo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let completion = complete_blocking(client_for(endpoint_of(&server)), "hi").await;

        assert!(completion.is_error());
        assert!(completion.text.contains("candidates[0]"));
        assert!(completion.raw_response.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn non_json_success_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let completion = complete_blocking(client_for(endpoint_of(&server)), "hi").await;

        assert!(completion.is_error());
        assert_eq!(completion.raw_response, None);
    }

    #[test]
    fn transport_failure_becomes_marked_text() {
        // nothing listens on port 1
        let completion = client_for("http://127.0.0.1:1/generate".to_string()).complete("hi");

        assert!(completion.is_error());
        assert_eq!(completion.raw_response, None);
    }
}
