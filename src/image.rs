//! Image fetching against cold-start inference endpoints.
//!
//! Dedicated inference backends commonly answer 503 while the model loads
//! into memory. This module owns the only timed backoff in the crate: a
//! bounded, strictly sequential retry loop driven by the endpoint's own
//! delay advice. A 2xx response that is not an image is a contract
//! violation and is never retried; retrying malformed output would not
//! help.

use std::future::Future;
use std::time::Duration;

use base64::prelude::*;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::warn;

use crate::client::ClientError;
use crate::config::{ImageGenConfig, TransportOptions};
use crate::http::{add_extra_headers, build_http_client};
use crate::model::ImageData;

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_LOADING_DELAY: Duration = Duration::from_secs(15);

/// What a single request to the endpoint produced, short of a hard error.
#[derive(Debug)]
enum AttemptOutcome {
    Image(ImageData),
    /// The model is still warming up; wait this long before trying again.
    Loading { wait: Duration },
}

/// Fetch one generated image, retrying while the model is loading.
pub async fn fetch_image(
    prompt: &str,
    config: &ImageGenConfig,
    transport: &TransportOptions,
) -> Result<ImageData, ClientError> {
    if config.api_key.is_empty() {
        return Err(ClientError::Config(
            "image generation API key is missing. Please add it in the API configuration \
             section."
                .to_string(),
        ));
    }

    let client = build_http_client(transport)?;
    run_retry_loop(|_| request_once(&client, prompt, config, transport)).await
}

async fn request_once(
    client: &reqwest::Client,
    prompt: &str,
    config: &ImageGenConfig,
    transport: &TransportOptions,
) -> Result<AttemptOutcome, ClientError> {
    let mut request = client
        .post(&config.endpoint)
        .header(
            AUTHORIZATION,
            format!("Bearer {}", config.api_key.expose_secret()),
        )
        .header(CONTENT_TYPE, "application/json");
    request = add_extra_headers(request, transport);

    let response = request
        .json(&serde_json::json!({ "inputs": prompt }))
        .send()
        .await?;
    let status = response.status();

    if status.is_success() {
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !mime_type.starts_with("image/") {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Contract(format!(
                "image endpoint returned non-image data: {text}"
            )));
        }
        let body: bytes::Bytes = response.bytes().await?;
        return Ok(AttemptOutcome::Image(ImageData {
            mime_type,
            base64: BASE64_STANDARD.encode(&body),
        }));
    }

    if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
        let body = response.text().await.unwrap_or_default();
        return Ok(AttemptOutcome::Loading {
            wait: loading_delay(&body),
        });
    }

    let detail = response.text().await.unwrap_or_default();
    warn!(%status, body = %detail, "image generation request failed");
    Err(ClientError::Api { status, detail })
}

#[derive(Deserialize)]
struct LoadingBody {
    #[serde(default)]
    estimated_time: Option<f64>,
}

/// Delay advised by a 503 body, falling back to the default when the body
/// carries none.
fn loading_delay(body: &str) -> Duration {
    serde_json::from_str::<LoadingBody>(body)
        .ok()
        .and_then(|parsed| parsed.estimated_time)
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(DEFAULT_LOADING_DELAY)
}

/// Drive attempts until one yields an image, a hard error occurs, or the
/// attempt budget runs out. Attempts are strictly sequential: the next one
/// never starts before the previous wait has elapsed.
async fn run_retry_loop<F, Fut>(mut attempt_fn: F) -> Result<ImageData, ClientError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<AttemptOutcome, ClientError>>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        match attempt_fn(attempt).await? {
            AttemptOutcome::Image(image) => return Ok(image),
            AttemptOutcome::Loading { wait } => {
                if attempt < MAX_ATTEMPTS {
                    warn!(
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        wait_secs = wait.as_secs_f64(),
                        "image model is loading; retrying after delay"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
    Err(ClientError::ModelLoading {
        attempts: MAX_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretString;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn image() -> ImageData {
        ImageData {
            mime_type: "image/png".to_string(),
            base64: "aW1n".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_loop_succeeds_after_two_loading_responses() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = run_retry_loop(|_| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call < 2 {
                    Ok(AttemptOutcome::Loading {
                        wait: Duration::from_secs(2),
                    })
                } else {
                    Ok(AttemptOutcome::Image(image()))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, image());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_loop_gives_up_after_three_attempts() {
        let calls = AtomicU32::new(0);

        let error = run_retry_loop(|_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Ok(AttemptOutcome::Loading {
                    wait: Duration::from_secs(2),
                })
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(error, ClientError::ModelLoading { attempts: 3 }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_loop_stops_on_hard_error() {
        let calls = AtomicU32::new(0);

        let error = run_retry_loop(|_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ClientError::Contract("non-image".to_string())) }
        })
        .await
        .unwrap_err();

        assert!(matches!(error, ClientError::Contract(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_loading_delay_parsing() {
        assert_eq!(
            loading_delay(r#"{"error": "loading", "estimated_time": 2.5}"#),
            Duration::from_secs_f64(2.5)
        );
        assert_eq!(loading_delay("{}"), DEFAULT_LOADING_DELAY);
        assert_eq!(loading_delay("not json"), DEFAULT_LOADING_DELAY);
        assert_eq!(
            loading_delay(r#"{"estimated_time": -1.0}"#),
            DEFAULT_LOADING_DELAY
        );
    }

    #[tokio::test]
    async fn test_fetch_image_decodes_image_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer hf-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"img".to_vec()),
            )
            .mount(&server)
            .await;

        let config = ImageGenConfig {
            use_alternate_backend: true,
            api_key: SecretString::from("hf-key"),
            endpoint: server.uri(),
        };
        let result = fetch_image("a castle", &config, &TransportOptions::new())
            .await
            .unwrap();
        assert_eq!(result.mime_type, "image/png");
        assert_eq!(result.base64, BASE64_STANDARD.encode(b"img"));
    }

    #[tokio::test]
    async fn test_fetch_image_rejects_non_image_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string("{\"unexpected\": true}"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = ImageGenConfig {
            use_alternate_backend: true,
            api_key: SecretString::from("hf-key"),
            endpoint: server.uri(),
        };
        let error = fetch_image("a castle", &config, &TransportOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(error, ClientError::Contract(_)));
    }

    #[tokio::test]
    async fn test_fetch_image_surfaces_other_statuses_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .expect(1)
            .mount(&server)
            .await;

        let config = ImageGenConfig {
            use_alternate_backend: true,
            api_key: SecretString::from("hf-key"),
            endpoint: server.uri(),
        };
        let error = fetch_image("a castle", &config, &TransportOptions::new())
            .await
            .unwrap_err();
        match error {
            ClientError::Api { status, detail } => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(detail, "bad token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_image_requires_api_key() {
        let config = ImageGenConfig {
            use_alternate_backend: true,
            api_key: SecretString::from(""),
            endpoint: "http://localhost".to_string(),
        };
        let error = fetch_image("a castle", &config, &TransportOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(error, ClientError::Config(_)));
    }
}
