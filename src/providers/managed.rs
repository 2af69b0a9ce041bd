//! Managed vendor transport.
//!
//! Talks to the vendor's generative API directly: text generation with a
//! native response schema for structured operations (strictly more reliable
//! than prompt-embedded format instructions), and a dedicated image
//! generation entry point. Requires the process-wide credential installed at
//! startup; without it, calls fail before any network I/O.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::client::{ClientError, Completion};
use crate::config::{self, SecretString, TransportOptions};
use crate::http::{add_extra_headers, build_http_client};
use crate::model::ImageData;
use crate::prompt::PromptEnvelope;
use crate::schema::SchemaObject;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const TEXT_MODEL: &str = "gemini-2.5-flash";
const IMAGE_MODEL: &str = "imagen-3.0-generate-002";
const IMAGE_OUTPUT_MIME: &str = "image/png";

/// Transport for the managed vendor backend.
pub struct ManagedTransport<'a> {
    credential: &'a SecretString,
    base_url: String,
    transport: &'a TransportOptions,
}

impl<'a> ManagedTransport<'a> {
    /// Build a transport with an explicit credential.
    pub fn new(credential: &'a SecretString, transport: &'a TransportOptions) -> Self {
        Self {
            credential,
            base_url: DEFAULT_API_BASE.to_string(),
            transport,
        }
    }

    /// Build a transport from the process-wide credential. Fails
    /// immediately when no credential was installed at startup.
    pub fn from_process_credential(
        transport: &'a TransportOptions,
    ) -> Result<Self, ClientError> {
        let credential = config::managed_credential().ok_or_else(|| {
            ClientError::Config(
                "managed provider credential is not initialized. Is the default API key \
                 available?"
                    .to_string(),
            )
        })?;
        Ok(Self::new(credential, transport))
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn handle_error_response(status: reqwest::StatusCode, body: &str) -> ClientError {
        if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(body) {
            ClientError::Api {
                status,
                detail: error.error.message,
            }
        } else {
            ClientError::Api {
                status,
                detail: body.to_string(),
            }
        }
    }

    /// Generate a single image for the prompt. The output mime type is
    /// fixed by the backend configuration.
    pub async fn generate_image(&self, prompt: &str) -> Result<ImageData, ClientError> {
        let url = format!(
            "{}/models/{}:predict?key={}",
            self.base_url,
            IMAGE_MODEL,
            self.credential.expose_secret()
        );
        let body = PredictRequest {
            instances: vec![PredictInstance { prompt }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: "1:1",
                output_mime_type: IMAGE_OUTPUT_MIME,
            },
        };

        let client = build_http_client(self.transport)?;
        let mut request = client.post(&url).header(CONTENT_TYPE, "application/json");
        request = add_extra_headers(request, self.transport);

        let response = request.json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!(%status, body = %text, "image generation request failed");
            return Err(Self::handle_error_response(status, &text));
        }

        let parsed: PredictResponse = serde_json::from_str(&text).map_err(|e| {
            ClientError::Contract(format!("image generation response was not valid JSON: {e}"))
        })?;
        let prediction = parsed.predictions.into_iter().next().ok_or_else(|| {
            ClientError::Contract("the model did not generate any images".to_string())
        })?;
        Ok(ImageData {
            mime_type: prediction
                .mime_type
                .unwrap_or_else(|| IMAGE_OUTPUT_MIME.to_string()),
            base64: prediction.bytes_base64_encoded,
        })
    }
}

#[async_trait]
impl Completion for ManagedTransport<'_> {
    async fn complete(
        &self,
        envelope: &PromptEnvelope,
        schema: Option<&SchemaObject>,
    ) -> Result<String, ClientError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url,
            TEXT_MODEL,
            self.credential.expose_secret()
        );

        // Image parts go before the text part.
        let mut parts = Vec::with_capacity(envelope.image_parts.len() + 1);
        for image in &envelope.image_parts {
            parts.push(RequestPart::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.base64.clone(),
                },
            });
        }
        parts.push(RequestPart::Text {
            text: envelope.flattened_text(),
        });

        let body = GenerateContentRequest {
            contents: vec![RequestContent { role: "user", parts }],
            generation_config: schema.map(|schema| GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema.to_managed_value(),
            }),
        };

        let client = build_http_client(self.transport)?;
        let mut request = client.post(&url).header(CONTENT_TYPE, "application/json");
        request = add_extra_headers(request, self.transport);

        let response = request.json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!(%status, body = %text, "text generation request failed");
            return Err(Self::handle_error_response(status, &text));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text).map_err(|e| {
            ClientError::Contract(format!("text generation response was not valid JSON: {e}"))
        })?;
        let content: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();
        if content.is_empty() {
            return Err(ClientError::Contract(
                "the model returned no content".to_string(),
            ));
        }
        Ok(content.trim().to_string())
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Vec<PredictInstance<'a>>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
struct PredictParameters {
    #[serde(rename = "sampleCount")]
    sample_count: u32,
    #[serde(rename = "aspectRatio")]
    aspect_ratio: &'static str,
    #[serde(rename = "outputMimeType")]
    output_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(rename = "bytesBase64Encoded")]
    bytes_base64_encoded: String,
    #[serde(default, rename = "mimeType")]
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn text_envelope() -> PromptEnvelope {
        PromptEnvelope {
            system_text: "system".to_string(),
            user_text: "user".to_string(),
            image_parts: vec![ImageData {
                mime_type: "image/png".to_string(),
                base64: "aGk=".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_complete_sends_native_schema_and_parses_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [
                    { "content": { "parts": [ { "text": " {\"ideas\": [\"a\", \"b\"]} " } ] } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = SecretString::from("test-key");
        let options = TransportOptions::new();
        let transport =
            ManagedTransport::new(&credential, &options).with_base_url(server.uri());
        let ideas = schema::ideas_schema();
        let content = transport
            .complete(&text_envelope(), Some(&ideas))
            .await
            .unwrap();
        assert_eq!(content, "{\"ideas\": [\"a\", \"b\"]}");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        // Image part first, flattened text second.
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert!(parts[0].get("inlineData").is_some());
        assert!(parts[1]["text"].as_str().unwrap().starts_with("system"));
    }

    #[tokio::test]
    async fn test_complete_without_schema_omits_generation_config() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [ { "content": { "parts": [ { "text": "a name" } ] } } ]
            })))
            .mount(&server)
            .await;

        let credential = SecretString::from("test-key");
        let options = TransportOptions::new();
        let transport =
            ManagedTransport::new(&credential, &options).with_base_url(server.uri());
        transport.complete(&text_envelope(), None).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("generationConfig").is_none());
    }

    #[tokio::test]
    async fn test_empty_candidates_is_a_contract_violation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let credential = SecretString::from("test-key");
        let options = TransportOptions::new();
        let transport =
            ManagedTransport::new(&credential, &options).with_base_url(server.uri());
        let error = transport.complete(&text_envelope(), None).await.unwrap_err();
        assert!(matches!(error, ClientError::Contract(_)));
    }

    #[tokio::test]
    async fn test_error_body_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": 400, "message": "API key not valid" }
            })))
            .mount(&server)
            .await;

        let credential = SecretString::from("bad-key");
        let options = TransportOptions::new();
        let transport =
            ManagedTransport::new(&credential, &options).with_base_url(server.uri());
        let error = transport.complete(&text_envelope(), None).await.unwrap_err();
        match error {
            ClientError::Api { status, detail } => {
                assert_eq!(status.as_u16(), 400);
                assert_eq!(detail, "API key not valid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/imagen-3.0-generate-002:predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [ { "bytesBase64Encoded": "aW1n" } ]
            })))
            .mount(&server)
            .await;

        let credential = SecretString::from("test-key");
        let options = TransportOptions::new();
        let transport =
            ManagedTransport::new(&credential, &options).with_base_url(server.uri());
        let image = transport.generate_image("a castle").await.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.base64, "aW1n");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["instances"][0]["prompt"], "a castle");
        assert_eq!(body["parameters"]["sampleCount"], 1);
    }

    #[tokio::test]
    async fn test_generate_image_with_no_predictions_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/imagen-3.0-generate-002:predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "predictions": [] })))
            .mount(&server)
            .await;

        let credential = SecretString::from("test-key");
        let options = TransportOptions::new();
        let transport =
            ManagedTransport::new(&credential, &options).with_base_url(server.uri());
        let error = transport.generate_image("a castle").await.unwrap_err();
        assert!(matches!(error, ClientError::Contract(_)));
    }
}
