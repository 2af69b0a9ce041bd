//! The unified client: one entry point per logical operation.
//!
//! Each operation builds its prompt, resolves the caller's
//! [`ProviderConfig`] to a concrete transport, executes the call, and (for
//! structured operations) coerces the response into its typed result. No
//! operation swallows a transport failure; everything surfaces as a
//! [`ClientError`] with a short human-readable message.

use async_trait::async_trait;
use nonempty::NonEmpty;
use thiserror::Error;

use crate::config::{ImageGenConfig, ProviderConfig, TransportOptions};
use crate::image;
use crate::model::{
    GeneratedWorldData, ImageData, ImportedCharacter, LoreField, LoreItem, ModelInfo,
    WorldGenOptions, WorldMode,
};
use crate::prompt::{self, PromptEnvelope};
use crate::providers::{openai_compat, ManagedTransport, OpenAiCompatTransport};
use crate::schema::{self, SchemaObject};

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A required credential or endpoint was missing; no network attempt
    /// was made.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network-level failure (connection, timeout, malformed transfer).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from a provider. `detail` carries the response
    /// body or the provider's own error message.
    #[error("API request failed: {status}")]
    Api {
        status: reqwest::StatusCode,
        detail: String,
    },

    /// A 2xx response whose body violates the provider contract, with no
    /// graceful fallback defined.
    #[error("provider returned malformed content: {0}")]
    Contract(String),

    /// The character-import sentinel, surfaced as a classified failure so
    /// callers never compare magic strings.
    #[error("character import failed: {0}")]
    ImportFailed(String),

    /// The image model was still warming up after every allowed attempt.
    #[error("image model is still loading after {attempts} attempts. Please try again later.")]
    ModelLoading { attempts: u32 },
}

/// The uniform transport seam: complete a prompt, optionally constrained
/// to a JSON shape.
///
/// One implementation per backend family keeps the variant-specific
/// header/auth/model logic encapsulated while call sites stay identical.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(
        &self,
        envelope: &PromptEnvelope,
        schema: Option<&SchemaObject>,
    ) -> Result<String, ClientError>;
}

/// The unified entry point for all generation operations.
///
/// Holds only transport-level settings; provider selection arrives with
/// every call as a fresh [`ProviderConfig`] snapshot, so concurrent
/// operations never share mutable state.
#[derive(Debug, Clone, Default)]
pub struct StoryClient {
    transport: TransportOptions,
}

impl StoryClient {
    pub fn new() -> Self {
        Self {
            transport: TransportOptions::new(),
        }
    }

    /// Build a client with explicit transport options.
    pub fn with_transport_options(transport: TransportOptions) -> Self {
        Self { transport }
    }

    fn resolve<'a>(
        &'a self,
        config: &'a ProviderConfig,
    ) -> Result<Box<dyn Completion + 'a>, ClientError> {
        match config {
            ProviderConfig::Managed => Ok(Box::new(ManagedTransport::from_process_credential(
                &self.transport,
            )?)),
            ProviderConfig::OpenAiCompatible {
                endpoint,
                api_key,
                model,
            } => Ok(Box::new(OpenAiCompatTransport::remote(
                endpoint,
                api_key,
                model,
                &self.transport,
            )?)),
            ProviderConfig::OpenAiCompatibleLocal { endpoint } => Ok(Box::new(
                OpenAiCompatTransport::local(endpoint, &self.transport)?,
            )),
        }
    }

    /// Continue the story (or open a new one when `story` is empty).
    pub async fn continue_story(
        &self,
        config: &ProviderConfig,
        story: &str,
        context: &str,
        flavor: &str,
        length_chars: u32,
    ) -> Result<String, ClientError> {
        let envelope = prompt::continuation(story, context, flavor, length_chars);
        self.resolve(config)?.complete(&envelope, None).await
    }

    /// Generate exactly two ideas for what could happen next. Malformed
    /// model output degrades to a single apologetic entry instead of
    /// failing; the list is never empty.
    pub async fn generate_ideas(
        &self,
        config: &ProviderConfig,
        story: &str,
        context: &str,
        flavor: &str,
    ) -> Result<NonEmpty<String>, ClientError> {
        let envelope = prompt::ideas(story, context, flavor);
        let raw = self
            .resolve(config)?
            .complete(&envelope, Some(&schema::ideas_schema()))
            .await?;
        Ok(schema::coerce_ideas(&raw))
    }

    /// Generate a name for the world.
    pub async fn generate_world_name(
        &self,
        config: &ProviderConfig,
        story: &str,
        lore: &[LoreItem],
    ) -> Result<String, ClientError> {
        let envelope = prompt::world_name(story, lore);
        self.resolve(config)?.complete(&envelope, None).await
    }

    /// Generate a short description for the world.
    pub async fn generate_world_description(
        &self,
        config: &ProviderConfig,
        world_name: &str,
        story: &str,
        lore: &[LoreItem],
    ) -> Result<String, ClientError> {
        let envelope = prompt::world_description(world_name, story, lore);
        self.resolve(config)?.complete(&envelope, None).await
    }

    /// Generate one field of a lore item, using its image when attached.
    pub async fn generate_lore_detail(
        &self,
        config: &ProviderConfig,
        story: &str,
        world_name: &str,
        world_description: &str,
        existing: &[LoreItem],
        target: &LoreItem,
        field: LoreField,
    ) -> Result<String, ClientError> {
        let envelope =
            prompt::lore_detail(story, world_name, world_description, existing, target, field);
        self.resolve(config)?.complete(&envelope, None).await
    }

    /// Extract a character from a character-sheet image.
    ///
    /// The extraction model reports an unusable image through the sentinel
    /// name in its normal response; that result is converted here to
    /// [`ClientError::ImportFailed`] rather than returned as a character.
    pub async fn import_character_from_image(
        &self,
        config: &ProviderConfig,
        image: ImageData,
    ) -> Result<ImportedCharacter, ClientError> {
        let envelope = prompt::character_import(image);
        let raw = self
            .resolve(config)?
            .complete(&envelope, Some(&schema::character_import_schema()))
            .await?;
        let character = schema::coerce_character(&raw)?;
        if character.is_failure_sentinel() {
            return Err(ClientError::ImportFailed(character.description));
        }
        Ok(character)
    }

    /// Generate a complete world from the option bag.
    pub async fn generate_full_world(
        &self,
        config: &ProviderConfig,
        options: &WorldGenOptions,
        mode: WorldMode,
    ) -> Result<GeneratedWorldData, ClientError> {
        let envelope = match mode {
            WorldMode::Fast => prompt::fast_world(options),
            WorldMode::Deep => prompt::deep_world(options),
        };
        let raw = self
            .resolve(config)?
            .complete(&envelope, Some(&schema::world_schema(mode)))
            .await?;
        schema::coerce_world(&raw, mode)
    }

    /// Generate an illustration for a lore item.
    pub async fn generate_lore_image(
        &self,
        config: &ImageGenConfig,
        item: &LoreItem,
        world_name: &str,
        world_description: &str,
    ) -> Result<ImageData, ClientError> {
        let prompt_text = prompt::lore_image(item, world_name, world_description);
        if config.use_alternate_backend {
            image::fetch_image(&prompt_text, config, &self.transport).await
        } else {
            ManagedTransport::from_process_credential(&self.transport)?
                .generate_image(&prompt_text)
                .await
        }
    }

    /// List the models an OpenAI-compatible endpoint serves.
    pub async fn fetch_available_models(
        &self,
        endpoint: &str,
    ) -> Result<Vec<ModelInfo>, ClientError> {
        openai_compat::fetch_models(endpoint, &self.transport).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_content_response(content: &str) -> serde_json::Value {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
    }

    async fn local_server_returning(content: &str) -> (MockServer, ProviderConfig) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_content_response(content)),
            )
            .mount(&server)
            .await;
        let config = ProviderConfig::OpenAiCompatibleLocal {
            endpoint: server.uri(),
        };
        (server, config)
    }

    #[tokio::test]
    async fn test_continue_story_returns_trimmed_text() {
        let (_server, config) = local_server_returning("  The door creaked open.  ").await;
        let client = StoryClient::new();
        let text = client
            .continue_story(&config, "story", "context", "Suspenseful", 400)
            .await
            .unwrap();
        assert_eq!(text, "The door creaked open.");
    }

    #[tokio::test]
    async fn test_generate_ideas_parses_structured_output() {
        let (_server, config) =
            local_server_returning(r#"{"ideas": ["first", "second"]}"#).await;
        let client = StoryClient::new();
        let ideas = client
            .generate_ideas(&config, "story", "", "Dramatic")
            .await
            .unwrap();
        assert_eq!(ideas.len(), 2);
        assert_eq!(ideas.head, "first");
    }

    #[tokio::test]
    async fn test_generate_ideas_degrades_on_malformed_output() {
        let (_server, config) = local_server_returning("I refuse to answer in JSON").await;
        let client = StoryClient::new();
        let ideas = client
            .generate_ideas(&config, "story", "", "Dramatic")
            .await
            .unwrap();
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas.head, schema::IDEAS_FALLBACK);
    }

    #[tokio::test]
    async fn test_import_sentinel_surfaces_as_classified_failure() {
        let (_server, config) = local_server_returning(
            r#"{"name": "Import Failed", "description": "Image is too blurry to read."}"#,
        )
        .await;
        let client = StoryClient::new();
        let image = ImageData {
            mime_type: "image/png".to_string(),
            base64: "aGk=".to_string(),
        };
        let error = client
            .import_character_from_image(&config, image)
            .await
            .unwrap_err();
        match error {
            ClientError::ImportFailed(reason) => {
                assert_eq!(reason, "Image is too blurry to read.")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_import_returns_character_on_success() {
        let (_server, config) = local_server_returning(
            r#"{"name": "Kara", "description": "A wandering cartographer."}"#,
        )
        .await;
        let client = StoryClient::new();
        let image = ImageData {
            mime_type: "image/png".to_string(),
            base64: "aGk=".to_string(),
        };
        let character = client
            .import_character_from_image(&config, image)
            .await
            .unwrap();
        assert_eq!(character.name, "Kara");
    }

    #[tokio::test]
    async fn test_full_world_deep_mode_requires_deep_sections() {
        // A fast-shaped payload must not pass deep-mode validation.
        let fast_payload = json!({
            "worldName": "Emberfall",
            "premise": "p",
            "factions": [],
            "races": [],
            "mainCharacter": {"name": "n", "desire": "d", "fear": "f", "edge": "e", "problem": "p"},
            "antagonist": {"name": "n", "motive": "m", "leverage": "l", "weakness": "w"},
            "starterHooks": []
        });
        let (_server, config) = local_server_returning(&fast_payload.to_string()).await;
        let client = StoryClient::new();
        let options = WorldGenOptions::default();

        let world = client
            .generate_full_world(&config, &options, WorldMode::Fast)
            .await
            .unwrap();
        assert_eq!(world.world_name, "Emberfall");

        let error = client
            .generate_full_world(&config, &options, WorldMode::Deep)
            .await
            .unwrap_err();
        assert!(matches!(error, ClientError::Contract(_)));
    }

    // No test in this binary installs the process-wide managed credential,
    // so the fail-fast path stays observable.
    #[tokio::test]
    async fn test_managed_without_credential_fails_before_any_io() {
        let client = StoryClient::new();
        let error = client
            .continue_story(&ProviderConfig::Managed, "s", "c", "Dramatic", 200)
            .await
            .unwrap_err();
        assert!(matches!(error, ClientError::Config(_)));
    }

    #[tokio::test]
    async fn test_transport_error_propagates_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .mount(&server)
            .await;
        let config = ProviderConfig::OpenAiCompatibleLocal {
            endpoint: server.uri(),
        };
        let client = StoryClient::new();
        let error = client
            .continue_story(&config, "s", "c", "Dramatic", 200)
            .await
            .unwrap_err();
        let message = error.to_string();
        assert!(message.starts_with("API request failed: 429"));
    }
}
