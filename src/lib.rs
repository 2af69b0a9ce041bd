//! # storyloom - Multi-Provider Story Generation Client
//!
//! The provider-abstraction core of a creative-writing studio: one uniform
//! client over three very different text backends (a managed vendor API, a
//! remote OpenAI-compatible endpoint, and a locally hosted
//! OpenAI-compatible server) plus two image-generation backends.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Closed provider dispatch: configuration resolves to a transport once
//!   per call, before any network I/O
//! - Schema-constrained JSON generation, native where the backend supports
//!   it and prompt-embedded where it does not
//! - Response coercion with per-operation fallback rules
//! - Bounded backoff for cold-start image endpoints
//!
//! ## Architecture
//!
//! Operations flow through four layers:
//!
//! 1. **`prompt`** renders story text, lore context and options into a
//!    [`PromptEnvelope`]
//! 2. **`client`** resolves the caller's [`ProviderConfig`] snapshot to a
//!    transport and executes the call
//! 3. **`providers`** implement the wire protocols
//! 4. **`schema`** validates structured responses into typed results
//!
//! ## Example
//! ```no_run
//! use storyloom::{ProviderConfig, StoryClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StoryClient::new();
//!     let config = ProviderConfig::OpenAiCompatibleLocal {
//!         endpoint: "http://localhost:5001/v1".to_string(),
//!     };
//!
//!     let continuation = client
//!         .continue_story(
//!             &config,
//!             "The lighthouse had been dark for years.",
//!             "",
//!             "Mysterious",
//!             400,
//!         )
//!         .await?;
//!     println!("{continuation}");
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod http;
pub mod image;
pub mod model;
pub mod prompt;
pub mod providers;
pub mod schema;

// Re-exports for convenience
pub use client::{ClientError, Completion, StoryClient};
pub use config::{
    init_managed_credential, init_managed_credential_from_env, Attribution, ImageGenConfig,
    ProviderConfig, SecretString, TransportOptions,
};
pub use model::{
    Flavor, GeneratedWorldData, ImageData, ImportedCharacter, LoreField, LoreItem, LoreKind,
    ModelInfo, WorldGenOptions, WorldMode,
};
pub use prompt::PromptEnvelope;
