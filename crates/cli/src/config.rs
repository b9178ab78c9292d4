//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub ratelimit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_provider")]
    pub provider: String,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_provider")]
    pub provider: String,

    #[serde(default = "default_identity_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub clerk: ClerkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClerkConfig {
    #[serde(default = "default_clerk_secret_key_env")]
    pub secret_key_env: String,

    #[serde(default = "default_clerk_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_ratelimit_provider")]
    pub provider: String,

    #[serde(default = "default_capacity")]
    pub capacity: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_ratelimit_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub upstash: UpstashConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstashConfig {
    #[serde(default = "default_upstash_url_env")]
    pub url_env: String,

    #[serde(default = "default_upstash_token_env")]
    pub token_env: String,
}

// Default value functions
fn default_store_provider() -> String {
    "sqlite".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./chirp.sqlite")
}

fn default_identity_provider() -> String {
    "clerk".to_string()
}

fn default_identity_timeout() -> u64 {
    10
}

fn default_clerk_secret_key_env() -> String {
    "CLERK_SECRET_KEY".to_string()
}

fn default_clerk_base_url() -> String {
    chirp_adapters::identity::CLERK_DEFAULT_BASE_URL.to_string()
}

fn default_ratelimit_provider() -> String {
    "upstash".to_string()
}

fn default_capacity() -> u32 {
    chirp_domain::RateLimitPolicy::DEFAULT_CAPACITY
}

fn default_window_secs() -> u64 {
    chirp_domain::RateLimitPolicy::DEFAULT_WINDOW.as_secs()
}

fn default_prefix() -> String {
    chirp_adapters::ratelimit::DEFAULT_PREFIX.to_string()
}

fn default_ratelimit_timeout() -> u64 {
    5
}

fn default_upstash_url_env() -> String {
    "UPSTASH_REDIS_REST_URL".to_string()
}

fn default_upstash_token_env() -> String {
    "UPSTASH_REDIS_REST_TOKEN".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: default_store_provider(),
            db_path: default_db_path(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            provider: default_identity_provider(),
            timeout_secs: default_identity_timeout(),
            clerk: ClerkConfig::default(),
        }
    }
}

impl Default for ClerkConfig {
    fn default() -> Self {
        Self {
            secret_key_env: default_clerk_secret_key_env(),
            base_url: default_clerk_base_url(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            provider: default_ratelimit_provider(),
            capacity: default_capacity(),
            window_secs: default_window_secs(),
            prefix: default_prefix(),
            timeout_secs: default_ratelimit_timeout(),
            upstash: UpstashConfig::default(),
        }
    }
}

impl Default for UpstashConfig {
    fn default() -> Self {
        Self {
            url_env: default_upstash_url_env(),
            token_env: default_upstash_token_env(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("CHIRP")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# chirp configuration

[store]
provider = "sqlite"  # sqlite, memory
db_path = "./chirp.sqlite"

[identity]
provider = "clerk"  # clerk, stub
timeout_secs = 10

[identity.clerk]
secret_key_env = "CLERK_SECRET_KEY"
base_url = "https://api.clerk.com"

[ratelimit]
provider = "upstash"  # upstash, memory
# 5 posts per rolling 60 seconds, per author
capacity = 5
window_secs = 60
prefix = "chirp:ratelimit"
timeout_secs = 5

[ratelimit.upstash]
url_env = "UPSTASH_REDIS_REST_URL"
token_env = "UPSTASH_REDIS_REST_TOKEN"
"#
        .to_string()
    }
}
