//! OpenAI-compatible chat transport.
//!
//! Serves both the remote hosted provider (bearer auth, attribution
//! headers, explicit model) and locally hosted servers (no auth, the server
//! picks its own model). Structured output is requested with
//! `response_format: json_object` plus a schema hint embedded in the system
//! text, since these endpoints have no native schema channel.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::{ClientError, Completion};
use crate::config::{SecretString, TransportOptions};
use crate::http::{add_extra_headers, build_http_client};
use crate::model::ModelInfo;
use crate::prompt::PromptEnvelope;
use crate::schema::SchemaObject;

/// Transport for any endpoint implementing the `/chat/completions` shape.
pub struct OpenAiCompatTransport<'a> {
    endpoint: &'a str,
    auth: Option<RemoteAuth<'a>>,
    transport: &'a TransportOptions,
}

/// Present only for the remote variant; the local variant never
/// authenticates and never names a model.
struct RemoteAuth<'a> {
    api_key: &'a SecretString,
    model: &'a str,
}

impl<'a> std::fmt::Debug for OpenAiCompatTransport<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatTransport")
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.auth.is_some())
            .finish()
    }
}

impl<'a> OpenAiCompatTransport<'a> {
    /// Transport for the remote hosted provider.
    pub fn remote(
        endpoint: &'a str,
        api_key: &'a SecretString,
        model: &'a str,
        transport: &'a TransportOptions,
    ) -> Result<Self, ClientError> {
        if api_key.is_empty() {
            return Err(ClientError::Config(
                "API key is missing. Please add it in the API configuration section.".to_string(),
            ));
        }
        if endpoint.is_empty() {
            return Err(ClientError::Config(
                "API URL is missing. Please add it in the API configuration section.".to_string(),
            ));
        }
        Ok(Self {
            endpoint,
            auth: Some(RemoteAuth { api_key, model }),
            transport,
        })
    }

    /// Transport for a locally hosted server.
    pub fn local(endpoint: &'a str, transport: &'a TransportOptions) -> Result<Self, ClientError> {
        if endpoint.is_empty() {
            return Err(ClientError::Config(
                "API URL is missing. Please add it in the API configuration section.".to_string(),
            ));
        }
        Ok(Self {
            endpoint,
            auth: None,
            transport,
        })
    }
}

#[async_trait]
impl Completion for OpenAiCompatTransport<'_> {
    async fn complete(
        &self,
        envelope: &PromptEnvelope,
        schema: Option<&SchemaObject>,
    ) -> Result<String, ClientError> {
        let body = build_chat_body(envelope, schema, self.auth.as_ref().map(|auth| auth.model));
        let client = build_http_client(self.transport)?;
        let url = format!("{}/chat/completions", self.endpoint);

        let mut request = client.post(&url).header(CONTENT_TYPE, "application/json");
        if let Some(auth) = &self.auth {
            request = request.header(
                AUTHORIZATION,
                format!("Bearer {}", auth.api_key.expose_secret()),
            );
            if let Some(attribution) = &self.transport.attribution {
                request = request
                    .header("HTTP-Referer", &attribution.referer)
                    .header("X-Title", &attribution.title);
            }
        }
        request = add_extra_headers(request, self.transport);

        let response = request.json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, body = %detail, "chat completion request failed");
            return Err(ClientError::Api { status, detail });
        }

        let text = response.text().await?;
        let completion: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            ClientError::Contract(format!("chat completion response was not valid JSON: {e}"))
        })?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                ClientError::Contract("chat completion response contained no choices".to_string())
            })?;
        Ok(content.trim().to_string())
    }
}

fn build_chat_body<'a>(
    envelope: &PromptEnvelope,
    schema: Option<&SchemaObject>,
    model: Option<&'a str>,
) -> ChatRequest<'a> {
    let mut system_text = envelope.system_text.clone();
    if let Some(schema) = schema {
        let hint = format!(
            "Respond with a single JSON object that matches this JSON Schema exactly:\n{}",
            schema.to_hint_text()
        );
        if system_text.is_empty() {
            system_text = hint;
        } else {
            system_text.push_str("\n\n");
            system_text.push_str(&hint);
        }
    }

    let mut messages = Vec::new();
    if !system_text.is_empty() {
        messages.push(ChatMessage {
            role: "system",
            content: ChatContent::Text(system_text),
        });
    }

    // Image parts go before the text part.
    let mut parts = Vec::with_capacity(envelope.image_parts.len() + 1);
    for image in &envelope.image_parts {
        parts.push(ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:{};base64,{}", image.mime_type, image.base64),
            },
        });
    }
    parts.push(ContentPart::Text {
        text: envelope.user_text.clone(),
    });
    messages.push(ChatMessage {
        role: "user",
        content: ChatContent::Parts(parts),
    });

    ChatRequest {
        model,
        messages,
        response_format: schema.map(|_| ResponseFormat {
            format_type: "json_object",
        }),
    }
}

/// List the models an OpenAI-compatible endpoint serves, sorted by id.
///
/// A read-only side operation used to populate a selection UI; no caching,
/// no retries.
pub async fn fetch_models(
    endpoint: &str,
    transport: &TransportOptions,
) -> Result<Vec<ModelInfo>, ClientError> {
    let client = build_http_client(transport)?;
    let response = client.get(format!("{endpoint}/models")).send().await?;
    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        warn!(%status, body = %detail, "model listing request failed");
        return Err(ClientError::Api { status, detail });
    }

    let text = response.text().await?;
    let listing: ModelListing = serde_json::from_str(&text).map_err(|e| {
        ClientError::Contract(format!("model listing response was not valid JSON: {e}"))
    })?;
    let mut models: Vec<ModelInfo> = listing
        .data
        .into_iter()
        .map(|entry| ModelInfo {
            id: entry.id,
            context_length: entry.context_length.unwrap_or(0),
        })
        .collect();
    models.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(models)
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: ChatContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ModelListing {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    context_length: Option<u64>,
}
