//! Reasoning-service collaborator
//!
//! One request/response exchange: the user's message goes out with a system
//! prompt describing the program description format, and the first JSON
//! object in the reply comes back untouched for the sanitizer.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};
use tracing::debug;

use crate::config::ReasonerSettings;
use crate::error::ReasonerError;
use crate::util::json::extract_json_object;

/// System prompt sent with every request.
pub const SYSTEM_PROMPT: &str = r#"Translate the user's request into a program for the EMMI robot.
Answer with a single JSON object and nothing else:
{"program":{"initFlags":[],"setup":[],"loop":[]},"explanation":"...","warnings":[]}

Nodes:
- {"type":"cmd","cmd":"ERN"} hardware command
- {"type":"delay","ms":500} pause in milliseconds
- {"type":"set_var","varType":"I","index":1,"op":"=","value":0} varType is one of I F C S B, index 1-5, op "=" assigns and "+" adds
- {"type":"if","expr":{"op":"==","left":"TR","right":1},"then":[],"else":[]}
- {"type":"while","expr":{"op":"<","left":"I1","right":3},"body":[]}
- {"type":"for","start":0,"end":10,"step":1,"body":[]}
- {"type":"switch","value":"I1","cases":[{"match":0,"body":[]}],"default":[]}
- {"type":"break"}

Commands (use no others):
eyes ERN ERF EGN EGF EBN EBF EAN EAF (red/green/blue/all, N on, F off)
wheels MF MB ML MR MS (forward, backward, left, right, stop)
buzzer BS (stop)

Operands are numbers, short strings, variables I1-I5 F1-F5 C1-C5 S1-S5 B1-B5,
or sensor readings TR (touch), AR (microphone) and VR (light).
AR reads 0 while sound is detected and 1 when quiet.
VR falls as the light gets brighter; direct light reads about 600.
Comparison ops: == != > >= < <=

Init flags: E eyes, B buzzer, M motors, T touch, A microphone, V light.
List only the hardware the program uses.
To blink an LED, put on, delay, off, delay in the loop.
Prefer conservative defaults when the request is ambiguous.

Example, blink the red LED every 500ms:
{"program":{"initFlags":["E"],"setup":[],"loop":[{"type":"cmd","cmd":"ERN"},{"type":"delay","ms":500},{"type":"cmd","cmd":"ERF"},{"type":"delay","ms":500}]},"explanation":"Blinks the red LED every 500ms.","warnings":[]}"#;

/// Parsed reply from the service, before sanitizing
#[derive(Debug, Clone, PartialEq)]
pub struct ReasonerReply {
    /// Raw program description
    pub program: Json,
    /// Service-supplied explanation, if it gave a string
    pub explanation: Option<String>,
    /// Service-supplied warnings, stringified
    pub warnings: Vec<String>,
}

impl ReasonerReply {
    /// Split a reply payload into its parts.
    ///
    /// The program is `payload.program` when that is an object, otherwise
    /// the payload itself.
    pub fn from_payload(payload: Json) -> Self {
        let explanation = payload
            .get("explanation")
            .and_then(Json::as_str)
            .map(str::to_string);
        let warnings = payload
            .get("warnings")
            .and_then(Json::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        Json::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let program = match payload.get("program") {
            Some(program @ Json::Object(_)) => program.clone(),
            _ => payload,
        };

        Self {
            program,
            explanation,
            warnings,
        }
    }
}

/// External service that turns free text into a program description
pub trait ReasoningService {
    /// Ask for a program implementing `message`.
    fn request_program(&self, message: &str) -> Result<ReasonerReply, ReasonerError>;
}

/// OpenAI-compatible chat-completions client
#[derive(Debug, Clone)]
pub struct ChatCompletionsReasoner {
    settings: ReasonerSettings,
    client: Client,
}

impl ChatCompletionsReasoner {
    /// Create a client; fails when no API key is configured.
    pub fn new(settings: ReasonerSettings) -> Result<Self, ReasonerError> {
        if settings.api_key.is_none() {
            return Err(ReasonerError::NotConfigured(format!(
                "{} is not configured.",
                settings.provider.key_var()
            )));
        }
        let client = build_client(settings.timeout_secs)?;
        Ok(Self { settings, client })
    }

    fn headers(&self) -> Result<HeaderMap, ReasonerError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = self.settings.api_key.as_ref() {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {key}"))?);
        }
        if let Some(site) = self.settings.site_url.as_ref() {
            headers.insert("http-referer", header_value(site)?);
        }
        if let Some(name) = self.settings.app_name.as_ref() {
            headers.insert("x-title", header_value(name)?);
        }
        Ok(headers)
    }
}

impl ReasoningService for ChatCompletionsReasoner {
    fn request_program(&self, message: &str) -> Result<ReasonerReply, ReasonerError> {
        let url = self.settings.completions_url();
        let user_prompt = json!({ "message": message }).to_string();
        let mut body = json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "messages": build_messages(SYSTEM_PROMPT, &user_prompt),
        });
        if let Some(max_tokens) = self.settings.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        debug!(url = %url, model = %self.settings.model, "requesting program");
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            return Err(ReasonerError::Status { status, body });
        }

        let completion: ChatCompletion = response.json()?;
        let text = extract_completion_text(&completion).ok_or(ReasonerError::EmptyCompletion)?;
        let payload = extract_json_object(&text).ok_or(ReasonerError::InvalidJson)?;
        Ok(ReasonerReply::from_payload(payload))
    }
}

fn header_value(text: &str) -> Result<HeaderValue, ReasonerError> {
    HeaderValue::from_str(text).map_err(|err| {
        ReasonerError::NotConfigured(format!("invalid header value: {err}"))
    })
}

fn build_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

fn build_messages(system_prompt: &str, user_prompt: &str) -> Vec<Json> {
    vec![
        json!({ "role": "system", "content": system_prompt }),
        json!({ "role": "user", "content": user_prompt }),
    ]
}

fn extract_completion_text(completion: &ChatCompletion) -> Option<String> {
    completion.choices.iter().find_map(|choice| {
        choice
            .message
            .as_ref()
            .and_then(|message| message.content.clone())
            .or_else(|| choice.text.clone())
            .filter(|text| !text.trim().is_empty())
    })
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<Message>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Message {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Provider;

    #[test]
    fn reply_prefers_nested_program() {
        let reply = ReasonerReply::from_payload(json!({
            "program": {"loop": [{"type": "cmd", "cmd": "ERN"}]},
            "explanation": "Red on.",
            "warnings": ["careful", 3]
        }));
        assert_eq!(reply.program, json!({"loop": [{"type": "cmd", "cmd": "ERN"}]}));
        assert_eq!(reply.explanation.as_deref(), Some("Red on."));
        assert_eq!(reply.warnings, vec!["careful", "3"]);
    }

    #[test]
    fn reply_falls_back_to_whole_payload() {
        let payload = json!({"loop": [], "program": "not an object"});
        let reply = ReasonerReply::from_payload(payload.clone());
        assert_eq!(reply.program, payload);
        assert!(reply.explanation.is_none());
        assert!(reply.warnings.is_empty());
    }

    #[test]
    fn missing_key_names_the_variable() {
        let err = ChatCompletionsReasoner::new(ReasonerSettings::for_provider(Provider::OpenRouter))
            .unwrap_err();
        assert_eq!(err.to_string(), "OPENROUTER_API_KEY is not configured.");
    }

    #[test]
    fn completion_text_skips_empty_choices() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "  "}},
                {"text": "{\"loop\": []}"}
            ]
        }))
        .unwrap();
        assert_eq!(
            extract_completion_text(&completion).as_deref(),
            Some("{\"loop\": []}")
        );
    }

    #[test]
    fn headers_carry_bearer_token() {
        let mut settings = ReasonerSettings::for_provider(Provider::OpenRouter);
        settings.api_key = Some("sk-test".into());
        settings.app_name = Some("EMMI".into());
        let reasoner = ChatCompletionsReasoner::new(settings).unwrap();
        let headers = reasoner.headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer sk-test");
        assert_eq!(headers["x-title"], "EMMI");
        assert!(headers.get("http-referer").is_none());
    }
}
