//! Provider and transport configuration.
//!
//! Configuration values are snapshots: callers construct them fresh from the
//! current user settings for every call, and this layer never mutates or
//! persists them. The one process-wide value is the managed provider's
//! credential, which is set once at startup and immutable afterwards.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Whether the secret is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Which text-generation backend a call should use.
///
/// A closed set: every operation resolves exactly one of these to a concrete
/// transport before any network I/O happens.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    /// The managed vendor backend. Uses the process-wide credential
    /// (see [`init_managed_credential`]); no per-call endpoint.
    Managed,

    /// A remote OpenAI-compatible endpoint. Requires a non-empty API key;
    /// `model` selects which hosted model serves the request.
    OpenAiCompatible {
        endpoint: String,
        api_key: SecretString,
        model: String,
    },

    /// A locally hosted OpenAI-compatible endpoint. No authentication, and
    /// the server decides the model itself.
    OpenAiCompatibleLocal { endpoint: String },
}

/// Which image-generation backend a call should use.
#[derive(Debug, Clone)]
pub struct ImageGenConfig {
    /// When set, images come from the alternate inference endpoint
    /// (with cold-start retry handling) instead of the managed backend.
    pub use_alternate_backend: bool,
    pub api_key: SecretString,
    pub endpoint: String,
}

/// Attribution headers sent to the remote OpenAI-compatible provider.
#[derive(Debug, Clone)]
pub struct Attribution {
    /// Value for the `HTTP-Referer` header.
    pub referer: String,
    /// Value for the `X-Title` header.
    pub title: String,
}

impl Default for Attribution {
    fn default() -> Self {
        Self {
            referer: "storyloom".to_string(),
            title: "AI Story Generator".to_string(),
        }
    }
}

/// Transport configuration shared by all backends.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Request timeout (applies to all transports)
    pub timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,

    /// Attribution sent to providers that want it. `None` disables the
    /// attribution headers entirely.
    pub attribution: Option<Attribution>,
}

impl TransportOptions {
    /// Create transport options with default attribution.
    pub fn new() -> Self {
        Self {
            attribution: Some(Attribution::default()),
            ..Self::default()
        }
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Set the attribution values.
    pub fn with_attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = Some(attribution);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

static MANAGED_CREDENTIAL: OnceLock<SecretString> = OnceLock::new();

/// Install the managed provider's API key for the lifetime of the process.
///
/// Returns `false` if a credential was already installed (the first one
/// wins; the credential is immutable once set).
pub fn init_managed_credential(key: impl Into<SecretString>) -> bool {
    MANAGED_CREDENTIAL.set(key.into()).is_ok()
}

/// Install the managed credential from the `GEMINI_API_KEY` environment
/// variable, if present. Returns whether a credential is now installed.
pub fn init_managed_credential_from_env() -> bool {
    match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.is_empty() => init_managed_credential(key) || managed_credential().is_some(),
        _ => managed_credential().is_some(),
    }
}

/// The process-wide managed credential, if one was installed at startup.
pub fn managed_credential() -> Option<&'static SecretString> {
    MANAGED_CREDENTIAL.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_debug_redacts() {
        let secret = SecretString::new("sk-very-secret".to_string());
        assert_eq!(format!("{:?}", secret), "SecretString([REDACTED])");
    }

    #[test]
    fn test_transport_options_headers() {
        let options = TransportOptions::new()
            .with_header("X-Test".to_string(), "1".to_string())
            .with_header("X-Other".to_string(), "2".to_string());
        let headers = options.extra_headers.unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["X-Test"], "1");
    }

    #[test]
    fn test_default_attribution() {
        let options = TransportOptions::new();
        let attribution = options.attribution.unwrap();
        assert_eq!(attribution.title, "AI Story Generator");
    }
}
