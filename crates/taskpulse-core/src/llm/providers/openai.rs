use crate::config::LlmConfig;
use crate::core_types::{LLMResponse, LLMStreamChunk, Message, Role, ToolCall, Usage};
use crate::errors::AssistantError;
use crate::llm::{LLMStream, ToolMetadata, LLM};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

/// Tool call fragments collected while streaming, keyed by their index.
#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: "https://api.openai.com/v1".to_string(),
            model,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn build_request_body(
        &self,
        messages: &[Message],
        tools: Option<&[ToolMetadata]>,
        stream: bool,
    ) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.format_messages(messages),
        });

        if let Some(temp) = self.temperature {
            body["temperature"] = temp.into();
        }

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }

        if stream {
            body["stream"] = true.into();
        }

        if let Some(tools) = tools {
            if !tools.is_empty() {
                log::debug!("Sending {} tool schemas to OpenAI", tools.len());
                let formatted_tools: Vec<Value> = tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": tool.name,
                                "description": tool.description,
                                "parameters": tool.input_schema
                            }
                        })
                    })
                    .collect();
                body["tools"] = formatted_tools.into();
                body["tool_choice"] = "auto".into();
            }
        }

        body
    }

    fn format_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let mut message = json!({
                    "role": self.format_role(&msg.role),
                    "content": msg.content
                });

                if let Role::Tool = msg.role {
                    if let Some(tool_call_id) = &msg.tool_call_id {
                        message["tool_call_id"] = json!(tool_call_id);
                    }
                }

                if let Role::Assistant = msg.role {
                    if let Some(tool_calls) = msg.tool_calls.as_ref().filter(|c| !c.is_empty()) {
                        let formatted_tool_calls: Vec<Value> = tool_calls
                            .iter()
                            .map(|tc| {
                                json!({
                                    "id": tc.id,
                                    "type": "function",
                                    "function": {
                                        "name": tc.name,
                                        "arguments": Self::encode_arguments(&tc.arguments)
                                    }
                                })
                            })
                            .collect();
                        message["tool_calls"] = json!(formatted_tool_calls);
                    }
                }

                message
            })
            .collect()
    }

    fn format_role(&self, role: &Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    /// Arguments that failed to parse are kept as the raw string; send them back verbatim.
    fn encode_arguments(arguments: &Value) -> String {
        match arguments {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }

    /// Parses argument JSON. Malformed text is kept as a string so that schema
    /// validation rejects the call instead of the whole response failing.
    fn decode_arguments(raw: &str) -> Value {
        if raw.trim().is_empty() {
            return json!({});
        }
        serde_json::from_str(raw).unwrap_or_else(|e| {
            log::warn!("Tool call arguments are not valid JSON ({}): {}", e, raw);
            Value::String(raw.to_string())
        })
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, AssistantError> {
        let url = format!("{}/chat/completions", self.api_base);
        log::debug!("OpenAI API request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| {
                "Unknown error while reading error response body".to_string()
            });
            return Err(AssistantError::ModelHttp {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response)
    }

    fn parse_response(&self, response: Value) -> Result<LLMResponse, AssistantError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|choices| choices.first())
            .ok_or_else(|| AssistantError::ParsingError("No choices in response".to_string()))?;
        let message = &choice["message"];

        let content = message["content"].as_str().map(|s| s.to_string());

        let tool_calls: Vec<ToolCall> = message["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|call| {
                        let function = call["function"].as_object()?;
                        let name = function.get("name")?.as_str()?;
                        let arguments = function
                            .get("arguments")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        Some(ToolCall {
                            id: call["id"].as_str().map(str::to_string),
                            name: name.to_string(),
                            arguments: Self::decode_arguments(arguments),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        if content.is_none() && tool_calls.is_empty() {
            return Err(AssistantError::ParsingError(
                "Response has neither content nor tool calls".to_string(),
            ));
        }

        let usage = serde_json::from_value::<Usage>(response["usage"].clone()).ok();

        Ok(LLMResponse {
            content,
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
            finish_reason: choice["finish_reason"].as_str().map(str::to_string),
            usage,
        })
    }

    /// Folds one `tool_calls` delta array into the partial calls.
    fn accumulate_tool_call_deltas(partials: &mut BTreeMap<u64, PartialToolCall>, deltas: &[Value]) {
        for (position, delta) in deltas.iter().enumerate() {
            let index = delta["index"].as_u64().unwrap_or(position as u64);
            let partial = partials.entry(index).or_default();
            if let Some(id) = delta["id"].as_str() {
                partial.id = Some(id.to_string());
            }
            if let Some(name) = delta["function"]["name"].as_str() {
                partial.name.push_str(name);
            }
            if let Some(arguments) = delta["function"]["arguments"].as_str() {
                partial.arguments.push_str(arguments);
            }
        }
    }

    fn finish_tool_calls(partials: BTreeMap<u64, PartialToolCall>) -> Vec<ToolCall> {
        partials
            .into_values()
            .filter(|p| !p.name.is_empty())
            .map(|p| ToolCall {
                id: p.id,
                name: p.name,
                arguments: Self::decode_arguments(&p.arguments),
            })
            .collect()
    }
}

#[async_trait]
impl LLM for OpenAIClient {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AssistantError> {
        let body = self.build_request_body(&messages, tools.as_deref(), false);
        let response = self.post(&body).await?;

        let response_text = response.text().await?;
        log::debug!("OpenAI API response: {}", response_text);

        let response_json: Value = serde_json::from_str(&response_text)
            .map_err(|e| AssistantError::ParsingError(format!("Invalid JSON response: {}", e)))?;

        self.parse_response(response_json)
    }

    async fn generate_stream(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMStream, AssistantError> {
        let body = self.build_request_body(&messages, tools.as_deref(), true);
        let response = self.post(&body).await?;

        let byte_stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()));
        let mut lines_reader = StreamReader::new(byte_stream).lines();

        let chunk_stream = async_stream::stream! {
            let mut partials: BTreeMap<u64, PartialToolCall> = BTreeMap::new();
            let mut finish_reason: Option<String> = None;

            loop {
                let line = match lines_reader.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(AssistantError::StreamInterrupted(e.to_string()));
                        return;
                    }
                };

                let Some(data) = line.strip_prefix("data:").map(str::trim) else {
                    continue;
                };
                if data == "[DONE]" {
                    break;
                }

                let event: Value = match serde_json::from_str(data) {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(AssistantError::ParsingError(format!("Invalid stream event: {}", e)));
                        return;
                    }
                };

                let Some(choice) = event["choices"].as_array().and_then(|c| c.first()) else {
                    continue;
                };
                let delta = &choice["delta"];

                if let Some(text) = delta["content"].as_str() {
                    if !text.is_empty() {
                        yield Ok(LLMStreamChunk::TextDelta(text.to_string()));
                    }
                }
                if let Some(tool_deltas) = delta["tool_calls"].as_array() {
                    Self::accumulate_tool_call_deltas(&mut partials, tool_deltas);
                }
                if let Some(reason) = choice["finish_reason"].as_str() {
                    finish_reason = Some(reason.to_string());
                }
            }

            let tool_calls = Self::finish_tool_calls(partials);
            if !tool_calls.is_empty() {
                yield Ok(LLMStreamChunk::ToolCalls(tool_calls));
            }
            yield Ok(LLMStreamChunk::Finished { finish_reason });
        };

        Ok(Box::pin(chunk_stream))
    }
}

/// Create an OpenAI-compatible client from configuration. The API key must
/// already be resolved into `auth.api_key`.
pub fn create_client(config: &LlmConfig, base_url: Option<&str>) -> Result<Arc<dyn LLM>, AssistantError> {
    let api_key = config.auth.api_key.clone().ok_or_else(|| {
        AssistantError::ConfigError(
            "No API key found for the language model. Set api_key or api_key_env".to_string(),
        )
    })?;

    let mut client = OpenAIClient::new(api_key, config.model.clone());
    if let Some(base_url) = base_url {
        client = client.with_api_base(base_url.to_string());
    }
    if config.parameters.temperature >= 0.0 {
        client = client.with_temperature(config.parameters.temperature);
    }
    if config.parameters.max_tokens > 0 {
        client = client.with_max_tokens(config.parameters.max_tokens);
    }

    Ok(Arc::new(client))
}
